use std::collections::BTreeSet;

use crate::constants::{FOOD_INSET, FOOD_SCORE, FOOD_SIZE, PLAN_PERIOD, START_LIVES};
use crate::maze::{GhostSpawn, Maze};
use crate::motion::{advance, attempt_move, can_move, legal_directions, overlaps, Body};
use crate::planner::{MonteCarloPlanner, PlannerConfig};
use crate::rng::{seeded, GameRng};
use crate::scheduler::PlanningSchedule;
use crate::types::{
    Direction, GameOverReason, GameSummary, GhostMode, GhostView, GridCoordinate, Personality,
    PlanSource, PlayerView, Position, RuntimeEvent, Snapshot,
};

mod spawn_system;
mod utils;

use self::utils::{manhattan, random_legal_direction, steer};

#[derive(Clone, Debug, Default)]
struct GameStats {
    captures: u32,
    food_eaten: u32,
    path_fallbacks: u32,
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    body: Body,
    queued: Option<Direction>,
}

#[derive(Clone, Debug)]
struct GhostInternal {
    id: String,
    personality: Personality,
    body: Body,
    plan_offset: u32,
    mode: GhostMode,
}

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub planner: PlannerConfig,
    pub plan_period: u32,
    pub lives: u32,
    pub max_ticks: Option<u64>,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            plan_period: PLAN_PERIOD,
            lives: START_LIVES,
            max_ticks: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub maze: Maze,

    options: GameEngineOptions,
    rng: GameRng,
    planner: MonteCarloPlanner,
    schedule: PlanningSchedule,
    player: PlayerInternal,
    ghosts: Vec<GhostInternal>,
    food: BTreeSet<GridCoordinate>,
    events: Vec<RuntimeEvent>,

    tick_counter: u64,
    score: u32,
    lives: u32,
    level: u32,
    started: bool,
    ended: bool,
    end_reason: Option<GameOverReason>,
    stats: GameStats,
    next_id_counter: u64,
}

impl GameEngine {
    pub fn new(maze: Maze, options: GameEngineOptions, seed: u64) -> Self {
        let tile_size = maze.tile_size();
        let player_origin = maze.origin_of(maze.player_spawn());
        let food = maze.food_cells().iter().copied().collect();
        let mut engine = Self {
            planner: MonteCarloPlanner::new(options.planner),
            schedule: PlanningSchedule::new(options.plan_period),
            lives: options.lives.max(1),
            options,
            rng: seeded(seed),
            player: PlayerInternal {
                body: Body::at_spawn(player_origin, tile_size),
                queued: None,
            },
            ghosts: Vec::new(),
            food,
            events: Vec::new(),
            tick_counter: 0,
            score: 0,
            level: 1,
            started: false,
            ended: false,
            end_reason: None,
            stats: GameStats::default(),
            next_id_counter: 1,
            maze,
        };
        engine.spawn_ghosts();
        engine
    }

    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.reset_positions();
        tracing::debug!(ghosts = self.ghosts.len(), "game started");
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn player_body(&self) -> &Body {
        &self.player.body
    }

    pub fn ghost_bodies(&self) -> impl Iterator<Item = &Body> {
        self.ghosts.iter().map(|ghost| &ghost.body)
    }

    pub fn legal_player_directions(&self) -> Vec<Direction> {
        legal_directions(&self.maze, &self.player.body)
    }

    /// Queues a turn; it is applied on the first tick where it is legal.
    pub fn set_player_direction(&mut self, dir: Direction) {
        self.player.queued = Some(dir);
    }

    pub fn distance_to_nearest_ghost(&self, cell: GridCoordinate) -> Option<i32> {
        self.ghosts
            .iter()
            .map(|ghost| manhattan(cell, self.maze.cell_of(ghost.body.position)))
            .min()
    }

    pub fn step(&mut self) {
        if !self.started || self.ended {
            return;
        }
        if let Some(limit) = self.options.max_ticks {
            if self.tick_counter >= limit {
                self.end_game(GameOverReason::TickLimit);
                return;
            }
        }
        self.tick_counter += 1;

        self.update_player();
        if self.resolve_captures() {
            return;
        }
        let planned = self.plan_due_ghosts();
        self.move_ghosts(&planned);
        self.collect_food();
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            score: self.score,
            lives: self.lives,
            level: self.level,
            food_left: self.food.len(),
            player: PlayerView {
                x: self.player.body.position.x,
                y: self.player.body.position.y,
                dir: self.player.body.direction,
                moving: !self.player.body.velocity.is_zero(),
            },
            ghosts: self
                .ghosts
                .iter()
                .map(|ghost| GhostView {
                    id: ghost.id.clone(),
                    personality: ghost.personality,
                    x: ghost.body.position.x,
                    y: ghost.body.position.y,
                    dir: ghost.body.direction,
                    mode: ghost.mode,
                    plan_offset: ghost.plan_offset,
                })
                .collect(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.end_reason,
            ticks: self.tick_counter,
            score: self.score,
            lives: self.lives,
            level: self.level,
            captures: self.stats.captures,
            food_eaten: self.stats.food_eaten,
            path_fallbacks: self.stats.path_fallbacks,
        }
    }

    fn update_player(&mut self) {
        if let Some(dir) = self.player.queued {
            if can_move(&self.maze, &self.player.body, dir) {
                steer(&self.maze, &mut self.player.body, dir);
                self.player.queued = None;
            }
        }
        advance(&self.maze, &mut self.player.body);
    }

    fn resolve_captures(&mut self) -> bool {
        let tile_size = self.maze.tile_size();
        let player_pos = self.player.body.position;
        let Some(catcher) = self
            .ghosts
            .iter()
            .find(|ghost| overlaps(ghost.body.position, tile_size, player_pos, tile_size))
            .map(|ghost| ghost.id.clone())
        else {
            return false;
        };

        self.lives = self.lives.saturating_sub(1);
        self.stats.captures += 1;
        tracing::info!(ghost = %catcher, lives = self.lives, tick = self.tick_counter, "player caught");
        self.events.push(RuntimeEvent::PlayerCaught {
            ghost_id: catcher,
            lives_left: self.lives,
        });
        if self.lives == 0 {
            self.end_game(GameOverReason::OutOfLives);
        } else {
            self.reset_positions();
        }
        true
    }

    /// Plans every ghost due this tick, in ghost order, before anything moves.
    fn plan_due_ghosts(&mut self) -> Vec<Option<Direction>> {
        let mut planned = vec![None; self.ghosts.len()];
        for (idx, slot) in planned.iter_mut().enumerate() {
            if !self
                .schedule
                .is_due(self.ghosts[idx].plan_offset, self.tick_counter)
            {
                continue;
            }
            self.ghosts[idx].mode = GhostMode::Planning;
            let decision = self.planner.plan(
                &self.maze,
                &self.ghosts[idx].body,
                self.ghosts[idx].personality,
                &self.player.body,
                &mut self.rng,
            );
            if decision.source == PlanSource::PathFallback {
                self.stats.path_fallbacks += 1;
            }
            self.events.push(RuntimeEvent::GhostPlanned {
                ghost_id: self.ghosts[idx].id.clone(),
                dir: decision.direction,
                source: decision.source,
            });
            *slot = Some(decision.direction);
        }
        planned
    }

    fn move_ghosts(&mut self, planned: &[Option<Direction>]) {
        for idx in 0..self.ghosts.len() {
            if let Some(dir) = planned.get(idx).copied().flatten() {
                let chosen = if can_move(&self.maze, &self.ghosts[idx].body, dir) {
                    Some(dir)
                } else {
                    random_legal_direction(&self.maze, &self.ghosts[idx].body, &mut self.rng)
                };
                if let Some(chosen) = chosen {
                    steer(&self.maze, &mut self.ghosts[idx].body, chosen);
                }
                self.ghosts[idx].mode = GhostMode::Committed;
            }

            if advance(&self.maze, &mut self.ghosts[idx].body) {
                continue;
            }
            // Bumped into a wall or the board edge.
            if let Some(dir) =
                random_legal_direction(&self.maze, &self.ghosts[idx].body, &mut self.rng)
            {
                attempt_move(&self.maze, &mut self.ghosts[idx].body, dir);
            }
        }
    }

    fn collect_food(&mut self) {
        let player_pos = self.player.body.position;
        let player_size = self.player.body.size;
        let eaten = self.food.iter().copied().find(|cell| {
            let origin = self.maze.origin_of(*cell);
            let pellet = Position::new(origin.x + FOOD_INSET, origin.y + FOOD_INSET);
            overlaps(player_pos, player_size, pellet, FOOD_SIZE)
        });
        let Some(cell) = eaten else {
            return;
        };

        self.food.remove(&cell);
        self.score += FOOD_SCORE;
        self.stats.food_eaten += 1;
        self.events.push(RuntimeEvent::FoodEaten {
            row: cell.row,
            col: cell.col,
        });

        if self.food.is_empty() {
            tracing::info!(level = self.level, score = self.score, "level cleared");
            self.events.push(RuntimeEvent::LevelCleared { level: self.level });
            self.level += 1;
            self.food = self.maze.food_cells().iter().copied().collect();
            self.reset_positions();
        }
    }

    fn end_game(&mut self, reason: GameOverReason) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.end_reason = Some(reason);
        tracing::info!(?reason, score = self.score, tick = self.tick_counter, "game over");
        self.events.push(RuntimeEvent::GameOver { reason });
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.next_id_counter);
        self.next_id_counter = self.next_id_counter.saturating_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{GameEngine, GameEngineOptions};
    use crate::maze::Maze;
    use crate::motion::{can_move, collides, legal_directions, Body};
    use crate::planner::PlannerConfig;
    use crate::rng::seeded;
    use crate::types::{Direction, GameOverReason, GhostMode, GridCoordinate, RuntimeEvent};

    fn fast_options() -> GameEngineOptions {
        GameEngineOptions {
            planner: PlannerConfig {
                rollouts: 8,
                ..PlannerConfig::default()
            },
            ..GameEngineOptions::default()
        }
    }

    fn started_engine(seed: u64) -> GameEngine {
        let mut engine = GameEngine::new(Maze::classic(), fast_options(), seed);
        engine.start();
        engine
    }

    #[test]
    fn same_seed_produces_same_progression() {
        let mut a = started_engine(424_242);
        let mut b = started_engine(424_242);
        for step in 0..300 {
            if step % 40 == 0 {
                let dir = Direction::ALL[(step / 40) % 4];
                a.set_player_direction(dir);
                b.set_player_direction(dir);
            }
            a.step();
            b.step();
            let sa = a.build_snapshot(false);
            let sb = b.build_snapshot(false);
            assert_eq!(sa.score, sb.score);
            assert_eq!(sa.lives, sb.lives);
            assert_eq!((sa.player.x, sa.player.y), (sb.player.x, sb.player.y));
            for (ga, gb) in sa.ghosts.iter().zip(sb.ghosts.iter()) {
                assert_eq!(ga.id, gb.id);
                assert_eq!((ga.x, ga.y), (gb.x, gb.y));
                assert_eq!(ga.dir, gb.dir);
                assert_eq!(ga.plan_offset, gb.plan_offset);
            }
            if a.is_ended() || b.is_ended() {
                assert_eq!(a.is_ended(), b.is_ended());
                break;
            }
        }
    }

    #[test]
    fn nothing_moves_before_start() {
        let mut engine = GameEngine::new(Maze::classic(), fast_options(), 1);
        let before = engine.build_snapshot(false);
        engine.step();
        let after = engine.build_snapshot(false);
        assert_eq!(after.tick, 0);
        assert!(after.ghosts.iter().all(|g| g.mode == GhostMode::Idle));
        for (a, b) in before.ghosts.iter().zip(after.ghosts.iter()) {
            assert_eq!((a.x, a.y), (b.x, b.y));
        }
    }

    #[test]
    fn start_sends_ghosts_wandering_with_legal_headings() {
        let engine = started_engine(9);
        assert_eq!(engine.ghosts.len(), 4);
        for ghost in &engine.ghosts {
            assert_eq!(ghost.mode, GhostMode::Wandering);
            assert_eq!(ghost.body.position, ghost.body.spawn);
            assert!(can_move(&engine.maze, &ghost.body, ghost.body.direction));
            assert!(ghost.plan_offset < engine.schedule.period());
        }
    }

    #[test]
    fn reset_is_idempotent() {
        let mut engine = started_engine(17);
        for _ in 0..60 {
            engine.step();
        }
        for _ in 0..5 {
            engine.reset_positions();
            assert_eq!(engine.player.body.position, engine.player.body.spawn);
            assert!(engine.player.body.velocity.is_zero());
            for ghost in &engine.ghosts {
                assert_eq!(ghost.body.position, ghost.body.spawn);
                assert_eq!(ghost.mode, GhostMode::Wandering);
                let mut at_spawn = ghost.body;
                at_spawn.direction = Direction::Up;
                assert!(legal_directions(&engine.maze, &at_spawn).contains(&ghost.body.direction));
                assert!(ghost.plan_offset < engine.schedule.period());
            }
        }
    }

    #[test]
    fn reset_leaves_no_trace_in_later_plans() {
        let mut engine = started_engine(23);
        for _ in 0..90 {
            engine.step();
        }
        engine.reset_positions();
        let ghost = engine.ghosts[0].body;
        let personality = engine.ghosts[0].personality;
        let mut fresh = Body::at_spawn(ghost.spawn, ghost.size);
        fresh.direction = ghost.direction;
        fresh.velocity = ghost.velocity;

        let after_reset = engine.planner.plan(
            &engine.maze,
            &ghost,
            personality,
            &engine.player.body,
            &mut seeded(5),
        );
        let from_fresh = engine.planner.plan(
            &engine.maze,
            &fresh,
            personality,
            &engine.player.body,
            &mut seeded(5),
        );
        assert_eq!(after_reset, from_fresh);
    }

    #[test]
    fn capture_costs_a_life_and_resets_positions() {
        let mut engine = started_engine(31);
        engine.ghosts[1].body.position = engine.player.body.position;
        engine.step();

        assert_eq!(engine.lives, 2);
        assert!(!engine.is_ended());
        for ghost in &engine.ghosts {
            assert_eq!(ghost.body.position, ghost.body.spawn);
        }
        let snapshot = engine.build_snapshot(true);
        assert!(snapshot.events.iter().any(|event| matches!(
            event,
            RuntimeEvent::PlayerCaught { ghost_id, lives_left: 2 } if ghost_id == "ghost_2"
        )));
    }

    #[test]
    fn losing_the_last_life_ends_the_game() {
        let mut engine = GameEngine::new(
            Maze::classic(),
            GameEngineOptions {
                lives: 1,
                ..fast_options()
            },
            37,
        );
        engine.start();
        engine.ghosts[0].body.position = engine.player.body.position;
        engine.step();
        assert!(engine.is_ended());
        let summary = engine.build_summary();
        assert_eq!(summary.reason, Some(GameOverReason::OutOfLives));
        assert_eq!(summary.lives, 0);

        let tick = engine.tick();
        engine.step();
        assert_eq!(engine.tick(), tick);
    }

    #[test]
    fn walking_over_food_scores() {
        let mut engine = started_engine(41);
        // Keep ghosts far away from the player for this test.
        engine.ghosts.clear();
        let total = engine.food.len();
        engine.set_player_direction(Direction::Left);
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.food.len(), total - 1);
        assert_eq!(engine.score, 10);
        assert!(!engine.food.contains(&GridCoordinate::new(15, 8)));
    }

    #[test]
    fn eating_the_last_pellet_clears_the_level() {
        let mut engine = started_engine(43);
        engine.ghosts.clear();
        engine.food.retain(|cell| *cell == GridCoordinate::new(15, 8));
        engine.set_player_direction(Direction::Left);
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.level, 2);
        assert_eq!(engine.food.len(), engine.maze.food_cells().len());
        assert_eq!(engine.player.body.position, engine.player.body.spawn);
        let snapshot = engine.build_snapshot(true);
        assert!(snapshot
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::LevelCleared { level: 1 })));
    }

    #[test]
    fn only_due_ghosts_plan_each_tick() {
        let mut engine = started_engine(47);
        // Park the player in the far corner so no capture interrupts planning.
        engine.player.body.position = engine.maze.origin_of(GridCoordinate::new(19, 1));
        for _ in 0..12 {
            let tick = engine.tick() + 1;
            let due: Vec<String> = engine
                .ghosts
                .iter()
                .filter(|g| engine.schedule.is_due(g.plan_offset, tick))
                .map(|g| g.id.clone())
                .collect();
            engine.step();
            let snapshot = engine.build_snapshot(true);
            let planned: Vec<String> = snapshot
                .events
                .iter()
                .filter_map(|event| match event {
                    RuntimeEvent::GhostPlanned { ghost_id, .. } => Some(ghost_id.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(planned, due);
            for id in &due {
                let ghost = engine.ghosts.iter().find(|g| &g.id == id).expect("ghost exists");
                assert_eq!(ghost.mode, GhostMode::Committed);
            }
        }
    }

    #[test]
    fn ghosts_never_end_a_tick_inside_walls() {
        let mut engine = started_engine(53);
        for step in 0..400 {
            if step % 25 == 0 {
                let options = engine.legal_player_directions();
                if let Some(dir) = options.get(step % options.len().max(1)) {
                    engine.set_player_direction(*dir);
                }
            }
            engine.step();
            for ghost in engine.ghost_bodies() {
                assert!(!collides(&engine.maze, ghost.position, ghost.size));
            }
            assert!(!collides(
                &engine.maze,
                engine.player_body().position,
                engine.player_body().size
            ));
            if engine.is_ended() {
                break;
            }
        }
    }

    #[test]
    fn tick_limit_ends_the_game() {
        let mut engine = GameEngine::new(
            Maze::classic(),
            GameEngineOptions {
                max_ticks: Some(5),
                ..fast_options()
            },
            59,
        );
        engine.start();
        engine.ghosts.clear();
        for _ in 0..10 {
            engine.step();
        }
        assert!(engine.is_ended());
        assert_eq!(engine.tick(), 5);
        assert_eq!(engine.build_summary().reason, Some(GameOverReason::TickLimit));
    }

    #[test]
    fn build_snapshot_drains_events_when_requested() {
        let mut engine = started_engine(61);
        engine.events.push(RuntimeEvent::LevelCleared { level: 9 });
        let kept = engine.build_snapshot(false);
        assert!(kept.events.is_empty());
        let first = engine.build_snapshot(true);
        let second = engine.build_snapshot(true);
        assert_eq!(first.events.len(), 1);
        assert!(second.events.is_empty());
    }

    #[test]
    fn nearest_ghost_distance_uses_grid_cells() {
        let engine = started_engine(67);
        let spawn = engine.maze.ghost_spawns()[0].cell;
        assert_eq!(engine.distance_to_nearest_ghost(spawn), Some(0));
        let mut empty = started_engine(67);
        empty.ghosts.clear();
        assert_eq!(empty.distance_to_nearest_ghost(spawn), None);
    }
}
