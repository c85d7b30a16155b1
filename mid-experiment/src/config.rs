use crate::error::ConfigError;
use mid_core::Condition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive integer range a reward is drawn from, serialized as `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRange(pub i64, pub i64);

impl RewardRange {
    pub fn low(&self) -> i64 {
        self.0
    }

    pub fn high(&self) -> i64 {
        self.1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaircaseConfig {
    pub initial_levels: BTreeMap<Condition, f64>,
    /// Step table for regular (scanner or behavioral) sessions.
    pub step_sizes: Vec<f64>,
    /// Coarser table used for the single calibration run.
    pub single_run_step_sizes: Vec<f64>,
    pub min_level: f64,
    pub max_level: f64,
    /// Per-condition trial budgets; conditions missing here get a share of
    /// the session derived from the run layout.
    pub trials: BTreeMap<Condition, usize>,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial_levels: Condition::ALL.iter().map(|c| (*c, 15.0)).collect(),
            step_sizes: vec![2.0, 2.0, 1.0, 1.0],
            single_run_step_sizes: vec![6.0, 3.0, 3.0, 2.0, 2.0, 1.0, 1.0],
            min_level: 0.0,
            max_level: 30.0,
            trials: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningsConfig {
    pub goal: i64,
    /// 0-based run on which rewards are nudged toward `goal`.
    pub nudge_run: Option<usize>,
    pub ranges: BTreeMap<Condition, RewardRange>,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        Self {
            goal: 40,
            nudge_run: Some(2),
            ranges: BTreeMap::from([
                (Condition::RewardHigh, RewardRange(5, 7)),
                (Condition::RewardLow, RewardRange(1, 3)),
                (Condition::LossHigh, RewardRange(-7, -5)),
                (Condition::LossLow, RewardRange(-3, -1)),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakConfig {
    pub enabled: bool,
    pub prompt: f64,
    pub rest: f64,
    pub ready: f64,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prompt: 2.0,
            rest: 26.0,
            ready: 2.0,
        }
    }
}

/// Experiment configuration parameters. All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub run_count: usize,
    pub trials_per_run: usize,

    pub min_target_duration: f64,
    pub max_target_duration: f64,
    pub max_response_duration: f64,
    pub cue_duration: f64,
    pub feedback_duration: f64,
    pub initial_fixation: f64,
    pub closing_fixation: f64,

    pub staircase: StaircaseConfig,
    pub earnings: EarningsConfig,
    pub breaks: BreakConfig,

    pub response_keys: Vec<String>,
    pub escape_keys: Vec<String>,
    pub trigger_keys: Vec<String>,

    /// Wait for a trigger before each run and hold a closing fixation after it.
    pub scanner: bool,
    /// One fast run with the coarse step table to find starting levels.
    pub single_run: bool,
    pub single_run_speed_factor: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            run_count: 3,
            trials_per_run: 30,
            min_target_duration: 0.1,
            max_target_duration: 0.5,
            max_response_duration: 0.5,
            cue_duration: 2.0,
            feedback_duration: 2.0,
            initial_fixation: 8.0,
            closing_fixation: 18.0,
            staircase: StaircaseConfig::default(),
            earnings: EarningsConfig::default(),
            breaks: BreakConfig::default(),
            response_keys: ["1", "2", "3", "4", "5", "6", "7", "8", "9", "space"]
                .map(String::from)
                .to_vec(),
            escape_keys: vec!["escape".into(), "esc".into()],
            trigger_keys: vec!["enter".into(), "equal".into(), "return".into()],
            scanner: false,
            single_run: false,
            single_run_speed_factor: 0.25,
        }
    }
}

impl ExperimentConfig {
    pub fn effective_run_count(&self) -> usize {
        if self.single_run { 1 } else { self.run_count }
    }

    pub fn step_sizes(&self) -> &[f64] {
        if self.single_run {
            &self.staircase.single_run_step_sizes
        } else {
            &self.staircase.step_sizes
        }
    }

    /// Multiplier applied to every fixation.
    pub fn fixation_factor(&self) -> f64 {
        if self.single_run {
            self.single_run_speed_factor
        } else {
            1.0
        }
    }

    /// Trials reserved for `condition`. Neutral gets two of every six slots.
    pub fn trial_budget(&self, condition: Condition) -> usize {
        if let Some(n) = self.staircase.trials.get(&condition) {
            return *n;
        }
        let per_slot = (self.effective_run_count() * self.trials_per_run).div_ceil(6);
        match condition {
            Condition::Neutral => per_slot * 2,
            _ => per_slot,
        }
    }

    pub fn nudge_on_run(&self, run: usize) -> bool {
        self.earnings.nudge_run == Some(run)
    }

    pub fn set_initial_level(&mut self, condition: Condition, level: f64) {
        self.staircase.initial_levels.insert(condition, level);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError(msg));

        if self.run_count == 0 || self.trials_per_run == 0 {
            return fail("run_count and trials_per_run must be > 0".into());
        }
        let steps = self.step_sizes();
        if steps.is_empty() {
            return fail("step table must not be empty".into());
        }
        if steps.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return fail("step sizes must be finite and non-negative".into());
        }
        if steps.windows(2).any(|w| w[1] > w[0]) {
            return fail("step sizes must be non-increasing".into());
        }
        let (lo, hi) = (self.staircase.min_level, self.staircase.max_level);
        if !(lo <= hi) {
            return fail(format!("level bounds [{lo}, {hi}] are inverted"));
        }
        if self.staircase.initial_levels.is_empty() {
            return fail("at least one condition needs an initial level".into());
        }
        for (condition, level) in &self.staircase.initial_levels {
            if !(lo..=hi).contains(level) {
                return fail(format!(
                    "initial level {level} for `{condition}` is outside [{lo}, {hi}]"
                ));
            }
        }
        if self.min_target_duration < 0.0 || self.min_target_duration > self.max_target_duration {
            return fail("min_target_duration must be within [0, max_target_duration]".into());
        }
        if self.max_response_duration < self.max_target_duration {
            return fail("max_response_duration must be >= max_target_duration".into());
        }
        let durations = [
            ("max_response_duration", self.max_response_duration),
            ("cue_duration", self.cue_duration),
            ("feedback_duration", self.feedback_duration),
        ];
        for (name, secs) in durations {
            if !(secs > 0.0 && secs.is_finite()) {
                return fail(format!("{name} must be a positive number of seconds"));
            }
        }
        if self.initial_fixation < 0.0 || self.closing_fixation < 0.0 {
            return fail("fixation durations must not be negative".into());
        }
        if !(self.single_run_speed_factor > 0.0) {
            return fail("single_run_speed_factor must be > 0".into());
        }
        for (condition, range) in &self.earnings.ranges {
            if range.low() > range.high() {
                return fail(format!("reward range for `{condition}` is inverted"));
            }
        }
        if self.response_keys.is_empty() {
            return fail("response_keys must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn budgets_follow_run_layout() {
        let mut cfg = ExperimentConfig::default();
        assert_eq!(cfg.trial_budget(Condition::RewardHigh), 15);
        assert_eq!(cfg.trial_budget(Condition::Neutral), 30);

        cfg.single_run = true;
        assert_eq!(cfg.trial_budget(Condition::LossLow), 5);
        assert_eq!(cfg.trial_budget(Condition::Neutral), 10);

        cfg.staircase.trials.insert(Condition::LossLow, 7);
        assert_eq!(cfg.trial_budget(Condition::LossLow), 7);
    }

    #[test]
    fn single_run_switches_steps_and_speed() {
        let mut cfg = ExperimentConfig::default();
        assert_eq!(cfg.step_sizes(), &[2.0, 2.0, 1.0, 1.0]);
        assert_eq!(cfg.fixation_factor(), 1.0);
        cfg.single_run = true;
        assert_eq!(cfg.effective_run_count(), 1);
        assert_eq!(cfg.step_sizes()[0], 6.0);
        assert_eq!(cfg.fixation_factor(), 0.25);
    }

    #[test]
    fn rejects_growing_step_table() {
        let mut cfg = ExperimentConfig::default();
        cfg.staircase.step_sizes = vec![1.0, 2.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_response_window_shorter_than_target() {
        let mut cfg = ExperimentConfig::default();
        cfg.max_response_duration = 0.3;
        let err = cfg.validate().unwrap_err();
        assert!(err.0.contains("max_response_duration"));
    }

    #[test]
    fn rejects_initial_level_out_of_bounds() {
        let mut cfg = ExperimentConfig::default();
        cfg.set_initial_level(Condition::Neutral, 31.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ExperimentConfig = serde_json::from_str(
            r#"{ "run_count": 2, "earnings": { "goal": 25 }, "staircase": { "initial_levels": { "neutral": 10 } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.run_count, 2);
        assert_eq!(cfg.trials_per_run, 30);
        assert_eq!(cfg.earnings.goal, 25);
        assert_eq!(cfg.earnings.nudge_run, Some(2));
        assert_eq!(cfg.staircase.initial_levels.len(), 1);
        assert_eq!(
            cfg.earnings.ranges.get(&Condition::RewardLow),
            Some(&RewardRange(1, 3))
        );
    }

    #[test]
    fn nudge_only_on_designated_run() {
        let cfg = ExperimentConfig::default();
        assert!(!cfg.nudge_on_run(0));
        assert!(cfg.nudge_on_run(2));
    }
}
