use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::constants::TILE_SIZE;
use crate::types::{Direction, GridCoordinate, Personality, Position};

pub const CLASSIC_TILES: [&str; 21] = [
    "XXXXXXXXXXXXXXXXXXX",
    "X        X        X",
    "X XX XXX X XXX XX X",
    "X                 X",
    "X XX X XXXXX X XX X",
    "X    X       X    X",
    "XXXX XXXX XXXX XXXX",
    "OOOX X       X XOOO",
    "XXXX X XXrXX X XXXX",
    "O       bpo       O",
    "XXXX X XXXXX X XXXX",
    "OOOX X       X XOOO",
    "XXXX X XXXXX X XXXX",
    "X        X        X",
    "X XX XXX X XXX XX X",
    "X  X     P     X  X",
    "XX X X XXXXX X X XX",
    "X    X   X   X    X",
    "X XXXXXX X XXXXXX X",
    "X                 X",
    "XXXXXXXXXXXXXXXXXXX",
];

#[derive(Debug, thiserror::Error)]
pub enum MazeError {
    #[error("maze has no rows")]
    Empty,

    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown tile {tile:?} at row {row}, column {col}")]
    UnknownTile { tile: char, row: usize, col: usize },

    #[error("maze has no player spawn ('P')")]
    MissingPlayerSpawn,

    #[error("maze has more than one player spawn (second at row {row}, column {col})")]
    DuplicatePlayerSpawn { row: usize, col: usize },

    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(i32),

    #[error("failed to read maze file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostSpawn {
    pub cell: GridCoordinate,
    pub personality: Personality,
}

#[derive(Clone, Debug)]
pub struct Maze {
    rows: i32,
    cols: i32,
    tile_size: i32,
    walls: Vec<bool>,
    food_cells: Vec<GridCoordinate>,
    player_spawn: GridCoordinate,
    ghost_spawns: Vec<GhostSpawn>,
}

impl Maze {
    pub fn classic() -> Self {
        match Self::parse(&CLASSIC_TILES, TILE_SIZE) {
            Ok(maze) => maze,
            Err(err) => unreachable!("built-in maze is valid: {err}"),
        }
    }

    pub fn load(path: &Path, tile_size: i32) -> Result<Self, MazeError> {
        let text = fs::read_to_string(path)?;
        let rows: Vec<&str> = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .collect();
        Self::parse(&rows, tile_size)
    }

    pub fn parse<S: AsRef<str>>(rows: &[S], tile_size: i32) -> Result<Self, MazeError> {
        if tile_size <= 0 {
            return Err(MazeError::InvalidTileSize(tile_size));
        }
        let expected = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        if rows.is_empty() || expected == 0 {
            return Err(MazeError::Empty);
        }

        let mut walls = Vec::with_capacity(rows.len() * expected);
        let mut food_cells = Vec::new();
        let mut player_spawn = None;
        let mut ghost_spawns = Vec::new();

        for (r, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let found = row.chars().count();
            if found != expected {
                return Err(MazeError::RaggedRow {
                    row: r,
                    expected,
                    found,
                });
            }
            for (c, tile) in row.chars().enumerate() {
                let cell = GridCoordinate::new(r as i32, c as i32);
                walls.push(tile == 'X');
                match tile {
                    'X' | 'O' => {}
                    ' ' => food_cells.push(cell),
                    'P' => {
                        if player_spawn.is_some() {
                            return Err(MazeError::DuplicatePlayerSpawn { row: r, col: c });
                        }
                        player_spawn = Some(cell);
                    }
                    other => match Personality::from_spawn_marker(other) {
                        Some(personality) => ghost_spawns.push(GhostSpawn { cell, personality }),
                        None => {
                            return Err(MazeError::UnknownTile {
                                tile: other,
                                row: r,
                                col: c,
                            })
                        }
                    },
                }
            }
        }

        let player_spawn = player_spawn.ok_or(MazeError::MissingPlayerSpawn)?;
        let mut maze = Self {
            rows: rows.len() as i32,
            cols: expected as i32,
            tile_size,
            walls,
            food_cells,
            player_spawn,
            ghost_spawns,
        };

        // Food the player can never reach would make the level unclearable.
        let reachable = maze.reachable_cells(player_spawn);
        maze.food_cells.retain(|cell| reachable.contains(cell));
        Ok(maze)
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn food_cells(&self) -> &[GridCoordinate] {
        &self.food_cells
    }

    pub fn player_spawn(&self) -> GridCoordinate {
        self.player_spawn
    }

    pub fn ghost_spawns(&self) -> &[GhostSpawn] {
        &self.ghost_spawns
    }

    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0 && row < self.rows && col < self.cols
    }

    pub fn is_walkable(&self, row: i32, col: i32) -> bool {
        if !self.in_bounds(row, col) {
            return false;
        }
        !self.walls[(row * self.cols + col) as usize]
    }

    pub fn is_cell_walkable(&self, cell: GridCoordinate) -> bool {
        self.is_walkable(cell.row, cell.col)
    }

    /// The one position-to-cell conversion shared by pathfinding and motion.
    pub fn cell_of(&self, position: Position) -> GridCoordinate {
        GridCoordinate {
            row: (position.y.div_euclid(self.tile_size)).clamp(0, self.rows - 1),
            col: (position.x.div_euclid(self.tile_size)).clamp(0, self.cols - 1),
        }
    }

    pub fn origin_of(&self, cell: GridCoordinate) -> Position {
        Position::new(cell.col * self.tile_size, cell.row * self.tile_size)
    }

    pub fn walkable_cells(&self) -> Vec<GridCoordinate> {
        let mut out = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.is_walkable(row, col) {
                    out.push(GridCoordinate::new(row, col));
                }
            }
        }
        out
    }

    pub fn reachable_cells(&self, start: GridCoordinate) -> HashSet<GridCoordinate> {
        let mut out = HashSet::new();
        if !self.is_cell_walkable(start) {
            return out;
        }

        let mut queue = VecDeque::new();
        out.insert(start);
        queue.push_back(start);

        while let Some(cell) = queue.pop_front() {
            for dir in Direction::ALL {
                let next = cell.neighbor(dir);
                if !self.is_cell_walkable(next) {
                    continue;
                }
                if out.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        out
    }
}
