use rand::Rng;

use crate::constants::{fickle_rollout_budget, STRATEGIC_PROJECTION_STEPS};
use crate::rng::symmetric;
use crate::types::{Personality, Position, Velocity};

const STRATEGIC_WEIGHT: f32 = 1.2;
const SNEAKY_PROXIMITY_WEIGHT: f32 = 0.9;
const SNEAKY_SEPARATION_WEIGHT: f32 = 0.01;
const FICKLE_PROXIMITY_WEIGHT: f32 = 0.6;
const FICKLE_STEP_NOISE: f32 = 0.1;

const STRATEGIC_CONVICTION: f32 = 1.05;
const SNEAKY_CONVICTION: f32 = 1.03;
const FICKLE_AGGREGATE_NOISE: f32 = 0.3;

#[derive(Clone, Copy, Debug)]
pub struct StepView {
    pub pursuer: Position,
    pub player: Position,
    pub player_velocity: Velocity,
    pub tile_size: i32,
}

impl StepView {
    fn tiles(&self, px: i32) -> f32 {
        px as f32 / self.tile_size as f32
    }

    fn euclidean_to(&self, target: Position) -> f32 {
        let dx = self.tiles(self.pursuer.x - target.x);
        let dy = self.tiles(self.pursuer.y - target.y);
        (dx * dx + dy * dy).sqrt()
    }

    fn manhattan_to(&self, target: Position) -> f32 {
        self.tiles((self.pursuer.x - target.x).abs() + (self.pursuer.y - target.y).abs())
    }
}

fn proximity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

impl Personality {
    pub fn step_score<R: Rng + ?Sized>(self, view: &StepView, rng: &mut R) -> f32 {
        match self {
            Self::Aggressive => proximity(view.euclidean_to(view.player)),
            Self::Strategic => {
                let projected = Position::new(
                    view.player.x + view.player_velocity.dx * STRATEGIC_PROJECTION_STEPS,
                    view.player.y + view.player_velocity.dy * STRATEGIC_PROJECTION_STEPS,
                );
                STRATEGIC_WEIGHT * proximity(view.euclidean_to(projected))
            }
            Self::Sneaky => {
                SNEAKY_PROXIMITY_WEIGHT * proximity(view.euclidean_to(view.player))
                    + SNEAKY_SEPARATION_WEIGHT * view.manhattan_to(view.player)
            }
            Self::Fickle => {
                FICKLE_PROXIMITY_WEIGHT * proximity(view.euclidean_to(view.player))
                    + symmetric(rng, FICKLE_STEP_NOISE)
            }
        }
    }

    pub fn adjust_aggregate<R: Rng + ?Sized>(self, average: f32, rng: &mut R) -> f32 {
        match self {
            Self::Aggressive => average,
            Self::Strategic => average * STRATEGIC_CONVICTION,
            Self::Sneaky => average * SNEAKY_CONVICTION,
            Self::Fickle => average + symmetric(rng, FICKLE_AGGREGATE_NOISE),
        }
    }

    pub fn rollout_budget(self, base: usize) -> usize {
        match self {
            Self::Fickle => fickle_rollout_budget(base),
            Self::Aggressive | Self::Strategic | Self::Sneaky => base,
        }
    }
}
