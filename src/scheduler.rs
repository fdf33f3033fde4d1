use rand::Rng;

use crate::constants::PLAN_PERIOD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanningSchedule {
    period: u32,
}

impl Default for PlanningSchedule {
    fn default() -> Self {
        Self::new(PLAN_PERIOD)
    }
}

impl PlanningSchedule {
    /// A zero period is treated as 1 (plan every tick).
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn is_due(&self, phase_offset: u32, tick: u64) -> bool {
        (tick + u64::from(phase_offset)) % u64::from(self.period) == 0
    }

    pub fn draw_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.random_range(0..self.period)
    }

    pub fn due_count(&self, offsets: &[u32], tick: u64) -> usize {
        offsets
            .iter()
            .filter(|offset| self.is_due(**offset, tick))
            .count()
    }
}
