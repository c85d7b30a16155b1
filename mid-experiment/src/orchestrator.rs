use crate::config::{EarningsConfig, ExperimentConfig};
use crate::earnings::EarningsRegulator;
use crate::error::{ExperimentError, OrderError, Result};
use crate::orders::TrialOrder;
use crate::pool::StaircasePool;
use crate::presenter::{CancelToken, Presenter};
use crate::record::{RecordSink, RunHeader, SessionSummary};
use crate::sequencer::{
    Feedback, ResponseCapture, SequencerSettings, TrialOutcome, TrialPhaseSequencer,
    TrialReport, TrialScorer,
};
use mid_core::{ClockId, Condition, Stimulus, TrialRecord, TrialSpec};
use rand::Rng;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Feeds one trial's response into its staircase and the earnings total.
struct Scoring<'a, R: Rng> {
    pool: &'a mut StaircasePool,
    earnings: &'a mut EarningsRegulator<R>,
    config: &'a EarningsConfig,
    nudge: bool,
}

impl<R: Rng> TrialScorer for Scoring<'_, R> {
    fn score(&mut self, capture: &ResponseCapture) -> Result<Feedback> {
        self.pool.record(capture.condition, capture.responded)?;
        let reward = self.earnings.reward_for_condition(
            self.config,
            capture.condition,
            capture.responded,
            self.nudge,
        );
        let total = self.earnings.apply(reward);
        Ok(Feedback { reward, total })
    }
}

/// Runs every configured run and trial, persisting as it goes.
pub struct RunOrchestrator<P: Presenter, K: RecordSink, R: Rng> {
    config: ExperimentConfig,
    sequencer: TrialPhaseSequencer,
    pool: StaircasePool,
    earnings: EarningsRegulator<R>,
    presenter: P,
    sink: K,
    trials_completed: usize,
}

impl<P: Presenter, K: RecordSink, R: Rng> RunOrchestrator<P, K, R> {
    pub fn new(
        config: ExperimentConfig,
        frame_duration: f64,
        presenter: P,
        sink: K,
        rng: R,
        cancel: CancelToken,
    ) -> Result<Self> {
        config.validate()?;
        let pool = StaircasePool::from_config(&config)?;
        let earnings = EarningsRegulator::new(config.earnings.goal, rng);
        let settings = SequencerSettings::from_config(&config, frame_duration);
        Ok(Self {
            sequencer: TrialPhaseSequencer::new(settings, cancel),
            config,
            pool,
            earnings,
            presenter,
            sink,
            trials_completed: 0,
        })
    }

    pub fn pool(&self) -> &StaircasePool {
        &self.pool
    }

    pub fn earnings(&self) -> &EarningsRegulator<R> {
        &self.earnings
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Checks that the orders cover every run, and fit the configured
    /// conditions and their budgets, before anything is shown.
    fn check_orders(&self, orders: &[TrialOrder]) -> Result<()> {
        let runs = self.config.effective_run_count();
        if orders.len() < runs {
            return Err(OrderError::OrderExhausted {
                available: orders.len(),
                required: runs,
            }
            .into());
        }
        let mut demand: BTreeMap<Condition, usize> = BTreeMap::new();
        for order in &orders[..runs] {
            let required = self.config.trials_per_run;
            if order.trials.len() < required {
                return Err(OrderError::OrderTooShort {
                    path: order.path.clone(),
                    rows: order.trials.len(),
                    required,
                }
                .into());
            }
            if let Some(spec) = order.trials[..required]
                .iter()
                .find(|t| !self.pool.contains(t.condition))
            {
                return Err(ExperimentError::UnknownCondition(
                    spec.condition.key().to_string(),
                ));
            }
            for spec in &order.trials[..required] {
                *demand.entry(spec.condition).or_default() += 1;
            }
        }
        for (condition, rows) in demand {
            let budget = self
                .pool
                .get(condition)
                .map_or(0, |s| s.trials_remaining());
            if rows > budget {
                return Err(OrderError::OverBudget {
                    condition,
                    rows,
                    budget,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Runs the session. Cancellation ends it early with a summary whose
    /// `completed` flag is false; only configuration or I/O faults are errors.
    pub fn run(&mut self, orders: &[TrialOrder]) -> Result<SessionSummary> {
        self.check_orders(orders)?;
        let runs = self.config.effective_run_count();
        let factor = self.config.fixation_factor();

        for (run, order) in orders.iter().take(runs).enumerate() {
            if self.config.scanner {
                let wait = Stimulus::Text("The task will begin momentarily. Get ready...".into());
                let trigger = self.config.trigger_keys.clone();
                if self
                    .sequencer
                    .wait_for_keys(&mut self.presenter, &trigger, &wait)
                    .is_break()
                {
                    return self.shutdown(false);
                }
            }

            self.presenter.reset_clock(ClockId::Run);
            if run == 0 {
                self.presenter.reset_clock(ClockId::Global);
            }
            let nudge = self.config.nudge_on_run(run);
            self.sink.begin_run(&RunHeader {
                run,
                order_file: order.path.clone(),
                nudge,
                epoch_seconds: epoch_seconds(),
            })?;
            info!(run = run + 1, runs, order = %order.path.display(), nudge, "starting run");

            let initial = self.config.initial_fixation * factor;
            if self.hold(initial, Stimulus::Fixation).is_break() {
                return self.shutdown(false);
            }

            for (trial, spec) in order.trials[..self.config.trials_per_run].iter().enumerate() {
                if self.run_trial(run, trial, spec, nudge)?.is_break() {
                    return self.shutdown(false);
                }
            }

            if self.config.scanner && !self.config.single_run {
                let closing = self.config.closing_fixation;
                if self.hold(closing, Stimulus::Fixation).is_break() {
                    return self.shutdown(false);
                }
            }
            if self.config.breaks.enabled && run + 1 < runs && self.take_break().is_break() {
                return self.shutdown(false);
            }
        }

        self.shutdown(true)
    }

    fn run_trial(
        &mut self,
        run: usize,
        trial: usize,
        spec: &TrialSpec,
        nudge: bool,
    ) -> Result<ControlFlow<()>> {
        let condition = spec.condition;
        let level = self.pool.duration_for(condition)?;
        let staircase_trial = self
            .pool
            .get(condition)
            .map(|s| s.trials_completed())
            .unwrap_or_default();

        let mut scoring = Scoring {
            pool: &mut self.pool,
            earnings: &mut self.earnings,
            config: &self.config.earnings,
            nudge,
        };
        let outcome =
            self.sequencer
                .run_trial(&mut self.presenter, spec, level, &mut scoring)?;
        let report = match outcome {
            TrialOutcome::Completed(report) => report,
            TrialOutcome::Cancelled => return Ok(ControlFlow::Break(())),
        };

        self.trials_completed += 1;
        let record = self.build_record(run, trial, spec, staircase_trial, nudge, report);
        info!(
            run = run + 1,
            trial = trial + 1,
            condition = %condition,
            level,
            responded = record.responded,
            rt = ?record.reaction_time,
            reward = record.reward,
            total = record.total_earnings,
            "trial complete"
        );
        self.sink.record(&record)?;
        Ok(ControlFlow::Continue(()))
    }

    fn build_record(
        &self,
        run: usize,
        trial: usize,
        spec: &TrialSpec,
        staircase_trial: usize,
        nudge: bool,
        report: TrialReport,
    ) -> TrialRecord {
        TrialRecord {
            run,
            trial,
            trial_number: self.trials_completed,
            condition: report.condition,
            spec: spec.clone(),
            assigned_level: report.level,
            staircase_trial,
            stimulus_duration: report.stimulus_duration,
            responded: report.capture.responded,
            reaction_time: report.capture.reaction_time,
            invalidated: report.capture.invalidated,
            cue_rt: report.cue_rt,
            too_fast_rt: report.too_fast_rt,
            too_slow_rt: report.too_slow_rt,
            nudge,
            reward: report.feedback.reward,
            total_earnings: report.feedback.total,
            fix_after_feedback_adjusted: report.fix_after_feedback_adjusted,
            phases: report.phases,
            onset: report.onset,
            time_trial: report.time_trial,
            time_run: self.presenter.elapsed(ClockId::Run),
            time_global: self.presenter.elapsed(ClockId::Global),
            epoch_seconds: epoch_seconds(),
        }
    }

    fn hold(&mut self, duration: f64, stimulus: Stimulus) -> ControlFlow<()> {
        self.sequencer.hold(&mut self.presenter, duration, &stimulus)
    }

    fn take_break(&mut self) -> ControlFlow<()> {
        let breaks = self.config.breaks.clone();
        self.hold(breaks.prompt, Stimulus::Text("Take a break".into()))?;
        self.hold(breaks.rest, Stimulus::Blank)?;
        self.hold(breaks.ready, Stimulus::Text("Get ready".into()))
    }

    fn shutdown(&mut self, completed: bool) -> Result<SessionSummary> {
        let summary = SessionSummary {
            completed,
            trials_completed: self.trials_completed,
            staircase_end: self.pool.snapshot(),
            total_earnings: self.earnings.total(),
        };
        if !completed {
            warn!(trials = self.trials_completed, "session cancelled");
        }
        for (condition, level) in &summary.staircase_end {
            warn!(%condition, level, "staircase end value");
        }
        warn!(total = summary.total_earnings, "total earnings");
        self.sink.finish(&summary)?;
        Ok(summary)
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
