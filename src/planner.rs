use rand::Rng;

use crate::constants::{PLAYER_CONTINUE_PROBABILITY, ROLLOUTS_PER_CANDIDATE, ROLLOUT_DEPTH};
use crate::maze::Maze;
use crate::motion::{legal_directions, Body};
use crate::pathfinding::resolve_first_step;
use crate::rollout::{rollout, RolloutParams};
use crate::types::{Direction, Personality, PlanSource};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannerConfig {
    /// Rollouts per candidate before the personality budget is applied.
    pub rollouts: usize,
    pub depth: usize,
    pub continue_probability: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            rollouts: ROLLOUTS_PER_CANDIDATE,
            depth: ROLLOUT_DEPTH,
            continue_probability: PLAYER_CONTINUE_PROBABILITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateScore {
    pub direction: Direction,
    pub score: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanDecision {
    pub direction: Direction,
    pub source: PlanSource,
    pub scores: Vec<CandidateScore>,
}

#[derive(Clone, Debug, Default)]
pub struct MonteCarloPlanner {
    config: PlannerConfig,
}

impl MonteCarloPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Picks a direction for `ghost` by averaging rollouts of every legal
    /// candidate. The first candidate reaching the best score wins ties.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        maze: &Maze,
        ghost: &Body,
        personality: Personality,
        player: &Body,
        rng: &mut R,
    ) -> PlanDecision {
        let candidates = legal_directions(maze, ghost);
        if candidates.is_empty() {
            tracing::debug!(?personality, dir = ?ghost.direction, "ghost has no legal move");
            return PlanDecision {
                direction: ghost.direction,
                source: PlanSource::Stuck,
                scores: Vec::new(),
            };
        }

        let params = RolloutParams {
            depth: self.config.depth,
            continue_probability: self.config.continue_probability,
        };
        let budget = personality.rollout_budget(self.config.rollouts);
        let mut scores = Vec::with_capacity(candidates.len());
        let mut best: Option<CandidateScore> = None;

        for direction in candidates {
            if budget == 0 {
                continue;
            }
            let mut total = 0.0f32;
            for _ in 0..budget {
                total += rollout(maze, ghost, direction, player, personality, params, rng);
            }
            let score = personality.adjust_aggregate(total / budget as f32, rng);
            if !score.is_finite() {
                continue;
            }
            let candidate = CandidateScore { direction, score };
            scores.push(candidate);
            if best.map_or(true, |b| score > b.score) {
                best = Some(candidate);
            }
        }

        match best {
            Some(best) => {
                tracing::debug!(
                    ?personality,
                    dir = ?best.direction,
                    score = best.score,
                    budget,
                    "monte carlo plan"
                );
                PlanDecision {
                    direction: best.direction,
                    source: PlanSource::MonteCarlo,
                    scores,
                }
            }
            None => {
                let target = maze.cell_of(player.position);
                let direction = resolve_first_step(maze, ghost, target, rng);
                tracing::warn!(?personality, dir = ?direction, "no scored candidate, using shortest path");
                PlanDecision {
                    direction,
                    source: PlanSource::PathFallback,
                    scores,
                }
            }
        }
    }
}
