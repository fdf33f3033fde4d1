use std::collections::VecDeque;

use rand::Rng;

use crate::maze::Maze;
use crate::motion::{legal_directions, Body};
use crate::rng::{pick_direction, random_direction};
use crate::types::{Direction, GridCoordinate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
    SameCell,
    Step(Direction),
    Unreachable,
    /// A path was found but traceback could not recover the first step.
    Inconsistent,
}

struct SearchResult {
    found: bool,
    came_by: Vec<Option<Direction>>,
    distance: Vec<Option<usize>>,
}

fn index(maze: &Maze, cell: GridCoordinate) -> usize {
    (cell.row * maze.cols() + cell.col) as usize
}

fn search(maze: &Maze, from: GridCoordinate, to: GridCoordinate) -> SearchResult {
    let cells = (maze.rows() * maze.cols()) as usize;
    let mut came_by = vec![None; cells];
    let mut distance = vec![None; cells];
    let mut queue = VecDeque::new();

    if !maze.in_bounds(from.row, from.col) || !maze.in_bounds(to.row, to.col) {
        return SearchResult {
            found: false,
            came_by,
            distance,
        };
    }

    distance[index(maze, from)] = Some(0);
    queue.push_back(from);

    while let Some(cell) = queue.pop_front() {
        if cell == to {
            return SearchResult {
                found: true,
                came_by,
                distance,
            };
        }
        let here = distance[index(maze, cell)].unwrap_or(0);
        for dir in Direction::ALL {
            let next = cell.neighbor(dir);
            if !maze.is_cell_walkable(next) {
                continue;
            }
            let slot = index(maze, next);
            if distance[slot].is_some() {
                continue;
            }
            distance[slot] = Some(here + 1);
            came_by[slot] = Some(dir);
            queue.push_back(next);
        }
    }

    SearchResult {
        found: false,
        came_by,
        distance,
    }
}

pub fn first_step_toward(maze: &Maze, from: GridCoordinate, to: GridCoordinate) -> PathStep {
    if from == to {
        return PathStep::SameCell;
    }

    let result = search(maze, from, to);
    if !result.found {
        return PathStep::Unreachable;
    }

    let mut cell = to;
    let limit = result.came_by.len();
    for _ in 0..limit {
        let Some(dir) = result.came_by[index(maze, cell)] else {
            break;
        };
        let prev = cell.neighbor(dir.opposite());
        if prev == from {
            return PathStep::Step(dir);
        }
        cell = prev;
    }
    PathStep::Inconsistent
}

/// Number of steps on a shortest path, `None` when `to` is unreachable.
pub fn path_length(maze: &Maze, from: GridCoordinate, to: GridCoordinate) -> Option<usize> {
    if from == to {
        return Some(0);
    }
    let result = search(maze, from, to);
    if !result.found {
        return None;
    }
    result.distance[index(maze, to)]
}

/// First BFS step from `body` toward `target`, degrading to a random direction
/// when no path can be used.
pub fn resolve_first_step<R: Rng + ?Sized>(
    maze: &Maze,
    body: &Body,
    target: GridCoordinate,
    rng: &mut R,
) -> Direction {
    let from = maze.cell_of(body.position);
    match first_step_toward(maze, from, target) {
        PathStep::SameCell => body.direction,
        PathStep::Step(dir) => dir,
        PathStep::Unreachable => {
            tracing::warn!(?from, ?target, "no path to target, picking a random legal direction");
            random_fallback(maze, body, rng)
        }
        PathStep::Inconsistent => {
            tracing::error!(?from, ?target, "path traceback failed to reach the start cell");
            debug_assert!(false, "path traceback failed from {from:?} to {target:?}");
            random_fallback(maze, body, rng)
        }
    }
}

fn random_fallback<R: Rng + ?Sized>(maze: &Maze, body: &Body, rng: &mut R) -> Direction {
    let legal = legal_directions(maze, body);
    pick_direction(rng, &legal).unwrap_or_else(|| random_direction(rng))
}
