use rand::Rng;

use crate::constants::{CAPTURE_EARLINESS_BONUS, CAPTURE_REWARD, ROLLOUT_JITTER};
use crate::maze::Maze;
use crate::motion::{attempt_move, can_move, legal_directions, overlaps, step_vector, Body};
use crate::rng::{pick_direction, symmetric};
use crate::scoring::StepView;
use crate::types::{Direction, Personality};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RolloutParams {
    pub depth: usize,
    pub continue_probability: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationState {
    pub pursuer: Body,
    pub player: Body,
}

impl SimulationState {
    pub fn seed(
        maze: &Maze,
        pursuer: &Body,
        initial_direction: Direction,
        player: &Body,
    ) -> Self {
        let mut pursuer = *pursuer;
        pursuer.direction = initial_direction;
        pursuer.velocity = step_vector(initial_direction, maze.tile_size());

        let mut player = *player;
        player.velocity = step_vector(player.direction, maze.tile_size());

        Self { pursuer, player }
    }

    fn captured(&self, tile_size: i32) -> bool {
        overlaps(
            self.pursuer.position,
            tile_size,
            self.player.position,
            tile_size,
        )
    }
}

fn repick_and_move<R: Rng + ?Sized>(maze: &Maze, body: &mut Body, rng: &mut R) {
    let legal = legal_directions(maze, body);
    if let Some(dir) = pick_direction(rng, &legal) {
        attempt_move(maze, body, dir);
    }
}

fn step_player<R: Rng + ?Sized>(
    maze: &Maze,
    player: &mut Body,
    continue_probability: f32,
    rng: &mut R,
) {
    let keep_heading =
        can_move(maze, player, player.direction) && rng.random::<f32>() < continue_probability;
    if keep_heading {
        if !attempt_move(maze, player, player.direction) {
            repick_and_move(maze, player, rng);
        }
        return;
    }

    let legal = legal_directions(maze, player);
    let Some(dir) = pick_direction(rng, &legal) else {
        return;
    };
    if !attempt_move(maze, player, dir) {
        repick_and_move(maze, player, rng);
    }
}

fn step_pursuer<R: Rng + ?Sized>(maze: &Maze, pursuer: &mut Body, rng: &mut R) {
    if attempt_move(maze, pursuer, pursuer.direction) {
        return;
    }
    repick_and_move(maze, pursuer, rng);
}

pub fn rollout<R: Rng + ?Sized>(
    maze: &Maze,
    pursuer: &Body,
    initial_direction: Direction,
    player: &Body,
    personality: Personality,
    params: RolloutParams,
    rng: &mut R,
) -> f32 {
    let mut state = SimulationState::seed(maze, pursuer, initial_direction, player);
    let tile_size = maze.tile_size();
    let mut reward = 0.0f32;

    for step in 0..params.depth {
        step_player(maze, &mut state.player, params.continue_probability, rng);
        step_pursuer(maze, &mut state.pursuer, rng);

        if state.captured(tile_size) {
            reward += CAPTURE_REWARD + (params.depth - step) as f32 * CAPTURE_EARLINESS_BONUS;
            break;
        }

        let view = StepView {
            pursuer: state.pursuer.position,
            player: state.player.position,
            player_velocity: state.player.velocity,
            tile_size,
        };
        reward += personality.step_score(&view, rng);
    }

    reward + symmetric(rng, ROLLOUT_JITTER)
}
