use super::*;

impl GameEngine {
    pub(super) fn spawn_ghosts(&mut self) {
        let tile_size = self.maze.tile_size();
        let spawns: Vec<GhostSpawn> = self.maze.ghost_spawns().to_vec();
        for spawn in spawns {
            let id = self.make_id("ghost");
            let origin = self.maze.origin_of(spawn.cell);
            self.ghosts.push(GhostInternal {
                id,
                personality: spawn.personality,
                body: Body::at_spawn(origin, tile_size),
                plan_offset: self.schedule.draw_offset(&mut self.rng),
                mode: GhostMode::Idle,
            });
        }
    }

    /// Puts one ghost back on its spawn tile with a random legal heading and a
    /// fresh phase offset. Nothing from earlier plans survives.
    pub fn reset_ghost(&mut self, ghost_idx: usize) {
        if ghost_idx >= self.ghosts.len() {
            return;
        }
        self.ghosts[ghost_idx].body.reset();
        if let Some(dir) =
            random_legal_direction(&self.maze, &self.ghosts[ghost_idx].body, &mut self.rng)
        {
            steer(&self.maze, &mut self.ghosts[ghost_idx].body, dir);
        }
        self.ghosts[ghost_idx].plan_offset = self.schedule.draw_offset(&mut self.rng);
        self.ghosts[ghost_idx].mode = if self.started {
            GhostMode::Wandering
        } else {
            GhostMode::Idle
        };
    }

    pub fn reset_positions(&mut self) {
        self.player.body.reset();
        self.player.queued = None;
        for idx in 0..self.ghosts.len() {
            self.reset_ghost(idx);
        }
    }
}
