use rand::Rng;

use crate::maze::Maze;
use crate::motion::{legal_directions, step_vector, Body};
use crate::rng::pick_direction;
use crate::types::{Direction, GridCoordinate};

pub(super) fn manhattan(a: GridCoordinate, b: GridCoordinate) -> i32 {
    (a.row - b.row).abs() + (a.col - b.col).abs()
}

/// Faces `body` along `dir` without moving it.
pub(super) fn steer(maze: &Maze, body: &mut Body, dir: Direction) {
    body.direction = dir;
    body.velocity = step_vector(dir, maze.tile_size());
}

pub(super) fn random_legal_direction<R: Rng + ?Sized>(
    maze: &Maze,
    body: &Body,
    rng: &mut R,
) -> Option<Direction> {
    let legal = legal_directions(maze, body);
    pick_direction(rng, &legal)
}
