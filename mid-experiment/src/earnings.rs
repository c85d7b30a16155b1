use crate::config::{EarningsConfig, RewardRange};
use mid_core::{Condition, Valence};
use rand::Rng;

/// Draws per-trial rewards and keeps the running total.
#[derive(Debug, Clone)]
pub struct EarningsRegulator<R: Rng> {
    total: i64,
    goal: i64,
    rng: R,
}

impl<R: Rng> EarningsRegulator<R> {
    pub fn new(goal: i64, rng: R) -> Self {
        Self { total: 0, goal, rng }
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    /// Reward for one trial. Gains pay only on a response, losses charge
    /// only on a miss; anything else earns 0.
    pub fn reward(
        &mut self,
        range: RewardRange,
        responded: bool,
        is_loss_condition: bool,
        nudge: bool,
    ) -> i64 {
        if responded == is_loss_condition {
            return 0;
        }
        self.reward_for_range(range, nudge)
    }

    /// Picks a value in `range`. With `nudge`, whichever endpoint lands the
    /// total closest to the goal, ties going to the low end.
    pub fn reward_for_range(&mut self, range: RewardRange, nudge: bool) -> i64 {
        if !nudge {
            return self.rng.random_range(range.low()..=range.high());
        }
        let distance = |x: i64| (self.total + x - self.goal).abs();
        if distance(range.high()) < distance(range.low()) {
            range.high()
        } else {
            range.low()
        }
    }

    /// Reward for `condition` using its configured range, if any.
    pub fn reward_for_condition(
        &mut self,
        config: &EarningsConfig,
        condition: Condition,
        responded: bool,
        nudge: bool,
    ) -> i64 {
        match (condition.valence(), config.ranges.get(&condition)) {
            (Valence::Neutral, _) | (_, None) => 0,
            (_, Some(range)) => self.reward(*range, responded, condition.is_loss(), nudge),
        }
    }

    /// Adds `reward` to the running total and returns the new total.
    pub fn apply(&mut self, reward: i64) -> i64 {
        self.total += reward;
        self.total
    }
}

/// Trial feedback text, e.g. `+$3.00`, `-$5.00`, `$0.00`.
pub fn trial_cash_string(reward: i64) -> String {
    match reward {
        r if r > 0 => format!("+${r}.00"),
        r if r < 0 => format!("-${}.00", -r),
        _ => "$0.00".to_string(),
    }
}

/// Running total text, e.g. `[$12.00]` or `[-$4.00]`.
pub fn total_cash_string(total: i64) -> String {
    if total < 0 {
        format!("[-${}.00]", -total)
    } else {
        format!("[${total}.00]")
    }
}
