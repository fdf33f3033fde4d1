pub mod constants;
pub mod engine;
pub mod maze;
pub mod motion;
pub mod pathfinding;
pub mod planner;
pub mod rng;
pub mod rollout;
pub mod scheduler;
pub mod scoring;
pub mod types;
