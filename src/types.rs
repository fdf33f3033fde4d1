use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Canonical enumeration order; also the BFS neighbor order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit `(d_row, d_col)` offset on the grid.
    pub fn grid_delta(self) -> (i32, i32) {
        match self {
            Self::Up => (-1, 0),
            Self::Down => (1, 0),
            Self::Left => (0, -1),
            Self::Right => (0, 1),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Aggressive,
    Strategic,
    Sneaky,
    Fickle,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Aggressive,
        Personality::Strategic,
        Personality::Sneaky,
        Personality::Fickle,
    ];

    pub fn from_spawn_marker(marker: char) -> Option<Self> {
        match marker {
            'r' => Some(Self::Aggressive),
            'p' => Some(Self::Strategic),
            'b' => Some(Self::Sneaky),
            'o' => Some(Self::Fickle),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridCoordinate {
    pub row: i32,
    pub col: i32,
}

impl GridCoordinate {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn neighbor(self, dir: Direction) -> Self {
        let (dr, dc) = dir.grid_delta();
        Self {
            row: self.row + dr,
            col: self.col + dc,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, velocity: Velocity) -> Self {
        Self {
            x: self.x + velocity.dx,
            y: self.y + velocity.dy,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Velocity {
    pub dx: i32,
    pub dy: i32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { dx: 0, dy: 0 };

    pub fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    Idle,
    Wandering,
    Planning,
    Committed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    MonteCarlo,
    PathFallback,
    Stuck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    OutOfLives,
    TickLimit,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub moving: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: String,
    pub personality: Personality,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub mode: GhostMode,
    #[serde(rename = "planOffset")]
    pub plan_offset: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    FoodEaten {
        row: i32,
        col: i32,
    },
    GhostPlanned {
        #[serde(rename = "ghostId")]
        ghost_id: String,
        dir: Direction,
        source: PlanSource,
    },
    PlayerCaught {
        #[serde(rename = "ghostId")]
        ghost_id: String,
        #[serde(rename = "livesLeft")]
        lives_left: u32,
    },
    LevelCleared {
        level: u32,
    },
    GameOver {
        reason: GameOverReason,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub score: u32,
    pub lives: u32,
    pub level: u32,
    #[serde(rename = "foodLeft")]
    pub food_left: usize,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: Option<GameOverReason>,
    pub ticks: u64,
    pub score: u32,
    pub lives: u32,
    pub level: u32,
    pub captures: u32,
    #[serde(rename = "foodEaten")]
    pub food_eaten: u32,
    #[serde(rename = "pathFallbacks")]
    pub path_fallbacks: u32,
}
