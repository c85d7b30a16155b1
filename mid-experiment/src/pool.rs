use crate::config::ExperimentConfig;
use crate::error::{ConfigError, ExperimentError, Result};
use crate::staircase::{StaircaseController, StaircaseParams};
use mid_core::Condition;
use std::collections::BTreeMap;

/// One independent staircase per configured condition.
#[derive(Debug, Clone)]
pub struct StaircasePool {
    stairs: BTreeMap<Condition, StaircaseController>,
}

impl StaircasePool {
    pub fn new(stairs: BTreeMap<Condition, StaircaseController>) -> Self {
        Self { stairs }
    }

    /// Builds a controller for every condition with an initial level.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self, ConfigError> {
        let bounds = (config.staircase.min_level, config.staircase.max_level);
        let stairs = config
            .staircase
            .initial_levels
            .iter()
            .map(|(condition, level)| {
                let params = StaircaseParams {
                    initial_level: *level,
                    step_sizes: config.step_sizes().to_vec(),
                    bounds,
                    trials: config.trial_budget(*condition),
                };
                StaircaseController::new(params).map(|s| (*condition, s))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { stairs })
    }

    pub fn contains(&self, condition: Condition) -> bool {
        self.stairs.contains_key(&condition)
    }

    pub fn get(&self, condition: Condition) -> Option<&StaircaseController> {
        self.stairs.get(&condition)
    }

    fn controller_mut(&mut self, condition: Condition) -> Result<&mut StaircaseController> {
        self.stairs
            .get_mut(&condition)
            .ok_or_else(|| ExperimentError::UnknownCondition(condition.key().to_string()))
    }

    /// Level to present for the next trial of `condition`.
    pub fn duration_for(&mut self, condition: Condition) -> Result<f64> {
        self.controller_mut(condition)?
            .next()
            .map_err(|_| ExperimentError::StaircaseExhausted(condition))
    }

    pub fn record(&mut self, condition: Condition, success: bool) -> Result<()> {
        self.controller_mut(condition)?
            .add_response(success)
            .map_err(|_| ExperimentError::StaircaseExhausted(condition))
    }

    /// Current level of every controller, finished or not.
    pub fn snapshot(&self) -> BTreeMap<Condition, f64> {
        self.stairs
            .iter()
            .map(|(condition, s)| (*condition, s.level()))
            .collect()
    }
}
