use crate::{Condition, TrialPhase};
use serde::{Deserialize, Serialize};

/// One row of a trial order: which condition and how long each fixation lasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub condition: Condition,
    /// Seconds.
    pub fix_after_cue: f64,
    pub fix_after_target: f64,
    pub fix_after_feedback: f64,
}

impl TrialSpec {
    /// Fixation durations multiplied by `factor` (single-run speed-up).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            condition: self.condition,
            fix_after_cue: self.fix_after_cue * factor,
            fix_after_target: self.fix_after_target * factor,
            fix_after_feedback: self.fix_after_feedback * factor,
        }
    }
}

/// Measured length of each phase, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub cue: f64,
    pub fix_after_cue: f64,
    pub target: f64,
    pub fix_after_target: f64,
    pub feedback: f64,
    pub fix_after_feedback: f64,
}

impl PhaseTimings {
    pub fn set(&mut self, phase: TrialPhase, secs: f64) {
        let slot = match phase {
            TrialPhase::Cue => &mut self.cue,
            TrialPhase::FixAfterCue => &mut self.fix_after_cue,
            TrialPhase::Target => &mut self.target,
            TrialPhase::FixAfterTarget => &mut self.fix_after_target,
            TrialPhase::Feedback => &mut self.feedback,
            TrialPhase::FixAfterFeedback => &mut self.fix_after_feedback,
        };
        *slot = secs;
    }

    pub fn total(&self) -> f64 {
        self.cue
            + self.fix_after_cue
            + self.target
            + self.fix_after_target
            + self.feedback
            + self.fix_after_feedback
    }
}

/// Recorded result per trial, handed to persistence as soon as the trial ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub run: usize,
    /// Trial index within the run, 0-based.
    pub trial: usize,
    /// Trial number across all runs, 1-based.
    pub trial_number: usize,
    pub condition: Condition,
    pub spec: TrialSpec,
    pub assigned_level: f64,
    /// Responses already fed to this condition's staircase before this trial.
    pub staircase_trial: usize,
    pub stimulus_duration: f64,
    pub responded: bool,
    /// Raw reaction time in the response window, kept even when invalidated.
    pub reaction_time: Option<f64>,
    /// A hit was voided because a key was seen during the cue or the fixation after it.
    pub invalidated: bool,
    pub cue_rt: Option<f64>,
    pub too_fast_rt: Option<f64>,
    pub too_slow_rt: Option<f64>,
    pub nudge: bool,
    pub reward: i64,
    pub total_earnings: i64,
    pub fix_after_feedback_adjusted: f64,
    pub phases: PhaseTimings,
    /// Global clock reading when the trial began.
    pub onset: f64,
    pub time_trial: f64,
    pub time_run: f64,
    pub time_global: f64,
    pub epoch_seconds: f64,
}
