use crate::constants::step_size;
use crate::maze::Maze;
use crate::types::{Direction, Position, Velocity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Body {
    pub position: Position,
    pub direction: Direction,
    pub velocity: Velocity,
    pub size: i32,
    pub spawn: Position,
}

impl Body {
    pub fn at_spawn(spawn: Position, size: i32) -> Self {
        Self {
            position: spawn,
            direction: Direction::Up,
            velocity: Velocity::ZERO,
            size,
            spawn,
        }
    }

    /// Back to spawn, facing up and standing still.
    pub fn reset(&mut self) {
        self.position = self.spawn;
        self.direction = Direction::Up;
        self.velocity = Velocity::ZERO;
    }
}

pub fn step_vector(direction: Direction, tile_size: i32) -> Velocity {
    let step = step_size(tile_size);
    match direction {
        Direction::Up => Velocity { dx: 0, dy: -step },
        Direction::Down => Velocity { dx: 0, dy: step },
        Direction::Left => Velocity { dx: -step, dy: 0 },
        Direction::Right => Velocity { dx: step, dy: 0 },
    }
}

pub fn overlaps(a: Position, a_size: i32, b: Position, b_size: i32) -> bool {
    a.x < b.x + b_size && a.x + a_size > b.x && a.y < b.y + b_size && a.y + a_size > b.y
}

pub fn collides(maze: &Maze, position: Position, size: i32) -> bool {
    let ts = maze.tile_size();
    let first_col = position.x.div_euclid(ts);
    let last_col = (position.x + size - 1).div_euclid(ts);
    let first_row = position.y.div_euclid(ts);
    let last_row = (position.y + size - 1).div_euclid(ts);
    for row in first_row..=last_row {
        for col in first_col..=last_col {
            if !maze.is_walkable(row, col) {
                return true;
            }
        }
    }
    false
}

pub fn can_move(maze: &Maze, body: &Body, direction: Direction) -> bool {
    let next = body
        .position
        .offset(step_vector(direction, maze.tile_size()));
    !collides(maze, next, body.size)
}

/// Turns and steps in one go. On collision the body is left exactly as it was.
pub fn attempt_move(maze: &Maze, body: &mut Body, direction: Direction) -> bool {
    let before = *body;
    body.direction = direction;
    body.velocity = step_vector(direction, maze.tile_size());
    body.position = body.position.offset(body.velocity);
    if collides(maze, body.position, body.size) {
        *body = before;
        return false;
    }
    true
}

/// Continues along the current velocity, reverting the step on collision.
pub fn advance(maze: &Maze, body: &mut Body) -> bool {
    if body.velocity.is_zero() {
        return false;
    }
    let next = body.position.offset(body.velocity);
    if collides(maze, next, body.size) {
        return false;
    }
    body.position = next;
    true
}

pub fn legal_directions(maze: &Maze, body: &Body) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|dir| can_move(maze, body, *dir))
        .collect()
}
