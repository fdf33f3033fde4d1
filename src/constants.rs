pub const TICK_MS: u64 = 50;

pub const TILE_SIZE: i32 = 32;
pub const CLASSIC_ROWS: i32 = 21;
pub const CLASSIC_COLS: i32 = 19;

pub const START_LIVES: u32 = 3;
pub const FOOD_SCORE: u32 = 10;
pub const FOOD_SIZE: i32 = 4;
pub const FOOD_INSET: i32 = 14;

pub const PLAN_PERIOD: u32 = 6;
pub const ROLLOUTS_PER_CANDIDATE: usize = 120;
pub const ROLLOUT_DEPTH: usize = 8;
pub const PLAYER_CONTINUE_PROBABILITY: f32 = 0.85;

pub const CAPTURE_REWARD: f32 = 100.0;
pub const CAPTURE_EARLINESS_BONUS: f32 = 10.0;
pub const ROLLOUT_JITTER: f32 = 0.01;

pub const FICKLE_MIN_ROLLOUTS: usize = 30;
pub const STRATEGIC_PROJECTION_STEPS: i32 = 4;

pub fn step_size(tile_size: i32) -> i32 {
    (tile_size / 4).max(1)
}

pub fn fickle_rollout_budget(base: usize) -> usize {
    (base / 3).max(FICKLE_MIN_ROLLOUTS)
}
