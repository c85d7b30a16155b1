//! Drives the six phases of one trial against the presenter's clocks.

use crate::config::ExperimentConfig;
use crate::earnings::{total_cash_string, trial_cash_string};
use crate::error::{ExperimentError, Result};
use crate::presenter::{CancelToken, Presenter};
use mid_core::{ActorStatus, ClockId, Condition, PhaseTimings, Stimulus, TrialPhase, TrialSpec};
use std::collections::HashSet;
use std::ops::ControlFlow;
use tracing::{debug, warn};

/// Outcome of the response window, handed to the scorer before feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseCapture {
    pub condition: Condition,
    pub responded: bool,
    pub reaction_time: Option<f64>,
    pub invalidated: bool,
}

/// What the feedback screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub reward: i64,
    pub total: i64,
}

/// Turns a captured response into staircase and earnings updates.
pub trait TrialScorer {
    fn score(&mut self, capture: &ResponseCapture) -> Result<Feedback>;
}

/// Everything measured during one completed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialReport {
    pub condition: Condition,
    pub level: f64,
    pub stimulus_duration: f64,
    pub capture: ResponseCapture,
    pub cue_rt: Option<f64>,
    pub too_fast_rt: Option<f64>,
    pub too_slow_rt: Option<f64>,
    pub feedback: Feedback,
    pub fix_after_feedback_adjusted: f64,
    pub phases: PhaseTimings,
    pub onset: f64,
    pub time_trial: f64,
}

#[derive(Debug)]
pub enum TrialOutcome {
    Completed(TrialReport),
    Cancelled,
}

/// Why a phase loop stopped early.
#[derive(Debug)]
pub(crate) enum Halt {
    Cancelled,
    Failed(ExperimentError),
}

impl From<ExperimentError> for Halt {
    fn from(e: ExperimentError) -> Self {
        Halt::Failed(e)
    }
}

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub frame_duration: f64,
    pub min_target_duration: f64,
    pub max_target_duration: f64,
    pub max_response_duration: f64,
    pub cue_duration: f64,
    pub feedback_duration: f64,
    pub fixation_factor: f64,
    pub response_keys: HashSet<String>,
    pub escape_keys: HashSet<String>,
}

impl SequencerSettings {
    pub fn from_config(config: &ExperimentConfig, frame_duration: f64) -> Self {
        Self {
            frame_duration,
            min_target_duration: config.min_target_duration,
            max_target_duration: config.max_target_duration,
            max_response_duration: config.max_response_duration,
            cue_duration: config.cue_duration,
            feedback_duration: config.feedback_duration,
            fixation_factor: config.fixation_factor(),
            response_keys: config.response_keys.iter().cloned().collect(),
            escape_keys: config.escape_keys.iter().cloned().collect(),
        }
    }
}

pub struct TrialPhaseSequencer {
    settings: SequencerSettings,
    cancel: CancelToken,
}

impl TrialPhaseSequencer {
    pub fn new(settings: SequencerSettings, cancel: CancelToken) -> Self {
        Self { settings, cancel }
    }

    /// Seconds the target stays visible at `level`.
    pub fn stimulus_duration(&self, level: f64) -> f64 {
        let s = &self.settings;
        (s.min_target_duration + s.frame_duration * level).min(s.max_target_duration)
    }

    /// Runs one trial from cue onset to the end of the trailing fixation.
    pub fn run_trial<P, S>(
        &self,
        presenter: &mut P,
        spec: &TrialSpec,
        level: f64,
        scorer: &mut S,
    ) -> Result<TrialOutcome>
    where
        P: Presenter,
        S: TrialScorer,
    {
        match self.trial_phases(presenter, spec, level, scorer) {
            Ok(report) => Ok(TrialOutcome::Completed(report)),
            Err(Halt::Cancelled) => Ok(TrialOutcome::Cancelled),
            Err(Halt::Failed(e)) => Err(e),
        }
    }

    fn trial_phases<P: Presenter, S: TrialScorer>(
        &self,
        presenter: &mut P,
        spec: &TrialSpec,
        level: f64,
        scorer: &mut S,
    ) -> Result<TrialReport, Halt> {
        let s = &self.settings;
        let factor = s.fixation_factor;
        let fixations = spec.scaled(factor);
        let condition = spec.condition;
        let mut phases = PhaseTimings::default();

        presenter.reset_clock(ClockId::Trial);
        let onset = presenter.elapsed(ClockId::Global);

        let cue = self.hold_phase(
            presenter,
            TrialPhase::Cue,
            s.cue_duration,
            &Stimulus::Cue(condition),
        )?;
        phases.set(TrialPhase::Cue, cue.elapsed);

        let fix = self.hold_phase(
            presenter,
            TrialPhase::FixAfterCue,
            fixations.fix_after_cue,
            &Stimulus::Fixation,
        )?;
        phases.set(TrialPhase::FixAfterCue, fix.elapsed);

        let stimulus_duration = self.stimulus_duration(level);
        let target = self.target_phase(presenter, stimulus_duration)?;
        phases.set(TrialPhase::Target, target.elapsed);

        let anticipated = cue.first_key.is_some() || fix.first_key.is_some();
        let invalidated = target.first_key.is_some() && anticipated;
        if invalidated {
            warn!(%condition, "response too fast, voiding hit");
        }
        let capture = ResponseCapture {
            condition,
            responded: target.first_key.is_some() && !invalidated,
            reaction_time: target.first_key,
            invalidated,
        };
        let feedback = scorer.score(&capture)?;

        let slow = self.hold_phase(
            presenter,
            TrialPhase::FixAfterTarget,
            fixations.fix_after_target,
            &Stimulus::Fixation,
        )?;
        phases.set(TrialPhase::FixAfterTarget, slow.elapsed);
        if slow.first_key.is_some() {
            debug!(%condition, "response too slow");
        }

        let screen = Stimulus::Feedback {
            trial: trial_cash_string(feedback.reward),
            total: total_cash_string(feedback.total),
        };
        let shown = self.hold_phase(presenter, TrialPhase::Feedback, s.feedback_duration, &screen)?;
        phases.set(TrialPhase::Feedback, shown.elapsed);

        // Pad the trailing fixation by the unused part of the response window.
        // The window closes at the later of stimulus offset and the key, so
        // this is `max_response_duration - rt` once the target is gone.
        let mut adjusted = fixations.fix_after_feedback;
        if target.first_key.is_some() {
            adjusted += (s.max_response_duration - target.elapsed).max(0.0) * factor;
        }
        let tail = self.hold_phase(
            presenter,
            TrialPhase::FixAfterFeedback,
            adjusted,
            &Stimulus::Fixation,
        )?;
        phases.set(TrialPhase::FixAfterFeedback, tail.elapsed);

        Ok(TrialReport {
            condition,
            level,
            stimulus_duration,
            capture,
            cue_rt: cue.first_key,
            too_fast_rt: fix.first_key,
            too_slow_rt: slow.first_key,
            feedback,
            fix_after_feedback_adjusted: adjusted,
            phases,
            onset,
            time_trial: presenter.elapsed(ClockId::Trial),
        })
    }

    /// Shows `stimulus` for `duration` seconds, noting the first response key.
    fn hold_phase<P: Presenter>(
        &self,
        presenter: &mut P,
        phase: TrialPhase,
        duration: f64,
        stimulus: &Stimulus,
    ) -> Result<PhaseCapture, Halt> {
        presenter.reset_clock(ClockId::Phase);
        let mut first_key = None;
        loop {
            let t = presenter.elapsed(ClockId::Phase);
            let keys = presenter.poll_keys();
            self.check_cancel(&keys)?;
            if phase.captures_input() && first_key.is_none() && self.any_response(&keys) {
                first_key = Some(t);
            }
            if t >= duration {
                break;
            }
            presenter.draw(stimulus);
            presenter.present();
        }
        let elapsed = presenter.elapsed(ClockId::Phase);
        debug!(phase = phase.name(), elapsed, ?first_key, "phase complete");
        Ok(PhaseCapture { elapsed, first_key })
    }

    /// Target visible for `stimulus_duration`, response window open until
    /// the first accepted key or the maximum response duration.
    fn target_phase<P: Presenter>(
        &self,
        presenter: &mut P,
        stimulus_duration: f64,
    ) -> Result<PhaseCapture, Halt> {
        let window = self.settings.max_response_duration;
        presenter.reset_clock(ClockId::Phase);
        let mut target = ActorStatus::NotStarted;
        let mut response = ActorStatus::NotStarted;
        let mut first_key = None;

        loop {
            let t = presenter.elapsed(ClockId::Phase);
            let keys = presenter.poll_keys();
            self.check_cancel(&keys)?;

            if target == ActorStatus::NotStarted {
                target = ActorStatus::Active;
                response = ActorStatus::Active;
            }
            if target == ActorStatus::Active && t >= stimulus_duration {
                target = ActorStatus::Finished;
            }
            if response == ActorStatus::Active {
                if self.any_response(&keys) {
                    first_key = Some(t);
                    response = ActorStatus::Finished;
                } else if t >= window {
                    response = ActorStatus::Finished;
                }
            }
            if ActorStatus::all_finished(&[target, response]) {
                break;
            }

            let frame = if target == ActorStatus::Active {
                Stimulus::Target
            } else {
                Stimulus::Fixation
            };
            presenter.draw(&frame);
            presenter.present();
        }
        let elapsed = presenter.elapsed(ClockId::Phase);
        debug!(phase = "target", elapsed, stimulus_duration, ?first_key, "phase complete");
        Ok(PhaseCapture { elapsed, first_key })
    }

    /// Holds a screen outside any trial (initial fixation, breaks).
    pub fn hold<P: Presenter>(
        &self,
        presenter: &mut P,
        duration: f64,
        stimulus: &Stimulus,
    ) -> ControlFlow<()> {
        presenter.reset_clock(ClockId::Phase);
        loop {
            let keys = presenter.poll_keys();
            if self.check_cancel(&keys).is_err() {
                return ControlFlow::Break(());
            }
            if presenter.elapsed(ClockId::Phase) >= duration {
                return ControlFlow::Continue(());
            }
            presenter.draw(stimulus);
            presenter.present();
        }
    }

    /// Shows `stimulus` until one of `keys` arrives (scanner trigger).
    pub fn wait_for_keys<P: Presenter>(
        &self,
        presenter: &mut P,
        keys: &[String],
        stimulus: &Stimulus,
    ) -> ControlFlow<()> {
        loop {
            let pressed = presenter.poll_keys();
            if self.check_cancel(&pressed).is_err() {
                return ControlFlow::Break(());
            }
            if pressed.iter().any(|k| keys.contains(k)) {
                return ControlFlow::Continue(());
            }
            presenter.draw(stimulus);
            presenter.present();
        }
    }

    fn any_response(&self, keys: &[String]) -> bool {
        keys.iter().any(|k| self.settings.response_keys.contains(k))
    }

    fn check_cancel(&self, keys: &[String]) -> Result<(), Halt> {
        if keys.iter().any(|k| self.settings.escape_keys.contains(k)) {
            warn!("escape pressed, stopping early");
            self.cancel.cancel();
        }
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct PhaseCapture {
    elapsed: f64,
    first_key: Option<f64>,
}
