//! 1-up/2-down adaptive staircase with a step table that shrinks per reversal.
//!
//! Two successes in a row move the level down, one failure moves it up. The
//! rule homes in on the level where `p(success)^2 = 0.5`, about 70.7%
//! success, so the up/down counts are fixed here rather than configurable.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

const N_DOWN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
}

/// Everything needed to build one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct StaircaseParams {
    pub initial_level: f64,
    pub step_sizes: Vec<f64>,
    pub bounds: (f64, f64),
    pub trials: usize,
}

/// One committed response and the level it was answered at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaircaseStep {
    pub level: f64,
    pub success: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("staircase has no trials left")]
pub struct Exhausted;

#[derive(Debug, Clone, PartialEq)]
pub struct StaircaseController {
    level: f64,
    direction: Direction,
    consecutive_successes: u32,
    reversal_count: usize,
    step_sizes: Vec<f64>,
    bounds: (f64, f64),
    trials_remaining: usize,
    done: bool,
    history: Vec<StaircaseStep>,
}

impl StaircaseController {
    pub fn new(params: StaircaseParams) -> Result<Self, ConfigError> {
        let StaircaseParams {
            initial_level,
            step_sizes,
            bounds,
            trials,
        } = params;
        if step_sizes.is_empty() {
            return Err(ConfigError("staircase needs at least one step size".into()));
        }
        if step_sizes.windows(2).any(|w| w[1] > w[0]) {
            return Err(ConfigError("staircase step sizes must be non-increasing".into()));
        }
        if !(bounds.0 <= bounds.1) {
            return Err(ConfigError(format!(
                "staircase bounds [{}, {}] are inverted",
                bounds.0, bounds.1
            )));
        }
        Ok(Self {
            level: initial_level.clamp(bounds.0, bounds.1),
            direction: Direction::None,
            consecutive_successes: 0,
            reversal_count: 0,
            step_sizes,
            bounds,
            trials_remaining: trials,
            done: trials == 0,
            history: Vec::with_capacity(trials),
        })
    }

    /// Level for the coming trial.
    pub fn next(&self) -> Result<f64, Exhausted> {
        if self.done {
            return Err(Exhausted);
        }
        Ok(self.level)
    }

    /// Commits the outcome of the trial run at the current level.
    pub fn add_response(&mut self, success: bool) -> Result<(), Exhausted> {
        if self.done {
            return Err(Exhausted);
        }
        let answered_at = self.level;

        if success {
            self.consecutive_successes += 1;
            if self.consecutive_successes >= N_DOWN {
                if self.direction != Direction::Down {
                    self.reversal_count += 1;
                }
                self.shift(-self.current_step());
                self.direction = Direction::Down;
                self.consecutive_successes = 0;
            }
        } else {
            // A broken success run counts as a reversal even if the last
            // move was already upward.
            if self.consecutive_successes > 0 || self.direction != Direction::Up {
                self.reversal_count += 1;
            }
            self.consecutive_successes = 0;
            self.shift(self.current_step());
            self.direction = Direction::Up;
        }

        self.history.push(StaircaseStep {
            level: answered_at,
            success,
        });
        self.trials_remaining -= 1;
        self.done = self.trials_remaining == 0;
        Ok(())
    }

    fn current_step(&self) -> f64 {
        let idx = self.reversal_count.min(self.step_sizes.len() - 1);
        self.step_sizes[idx]
    }

    fn shift(&mut self, delta: f64) {
        self.level = (self.level + delta).clamp(self.bounds.0, self.bounds.1);
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn reversal_count(&self) -> usize {
        self.reversal_count
    }

    pub fn trials_remaining(&self) -> usize {
        self.trials_remaining
    }

    /// Responses committed so far.
    pub fn trials_completed(&self) -> usize {
        self.history.len()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    pub fn history(&self) -> &[StaircaseStep] {
        &self.history
    }
}
