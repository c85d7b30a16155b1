use mid_core::{Condition, Stimulus, TrialSpec};
use mid_experiment::{
    CancelToken, ExperimentConfig, ExperimentError, FramePresenter, MemorySink, OrderError,
    ParticipantProfile, Responder, RunOrchestrator, SimulatedParticipant, StaircaseController,
    StaircaseParams, TrialOrder,
};
use mid_timing::VirtualTimer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::PathBuf;

const FRAME: f64 = 1.0 / 128.0;
const LAYOUT: [Condition; 6] = [
    Condition::RewardHigh,
    Condition::Neutral,
    Condition::LossLow,
    Condition::RewardLow,
    Condition::LossHigh,
    Condition::Neutral,
];

type Participant = SimulatedParticipant<StdRng>;
type Session<R> = RunOrchestrator<FramePresenter<VirtualTimer, R>, MemorySink, StdRng>;

fn config(runs: usize) -> ExperimentConfig {
    let mut cfg = ExperimentConfig {
        run_count: runs,
        trials_per_run: 6,
        cue_duration: 0.25,
        feedback_duration: 0.25,
        initial_fixation: 0.25,
        closing_fixation: 0.5,
        ..ExperimentConfig::default()
    };
    cfg.breaks.prompt = 0.125;
    cfg.breaks.rest = 0.25;
    cfg.breaks.ready = 0.125;
    cfg.earnings.nudge_run = Some(1);
    cfg
}

fn order(name: &str, rotate: usize) -> TrialOrder {
    let trials = (0..6)
        .map(|i| TrialSpec {
            condition: LAYOUT[(i + rotate) % 6],
            fix_after_cue: 0.125,
            fix_after_target: 0.125,
            fix_after_feedback: 0.25,
        })
        .collect();
    TrialOrder {
        path: PathBuf::from(name),
        trials,
    }
}

fn orders(n: usize) -> Vec<TrialOrder> {
    (0..n).map(|i| order(&format!("order{i}.csv"), i)).collect()
}

fn participant(seed: u64) -> Participant {
    let profile = ParticipantProfile {
        threshold: 0.2,
        ..ParticipantProfile::default()
    };
    SimulatedParticipant::new(profile, StdRng::seed_from_u64(seed))
}

fn session<R: Responder>(cfg: ExperimentConfig, responder: R, seed: u64) -> Session<R> {
    let presenter = FramePresenter::new(VirtualTimer::new(), responder, FRAME);
    RunOrchestrator::new(
        cfg,
        FRAME,
        presenter,
        MemorySink::default(),
        StdRng::seed_from_u64(seed),
        CancelToken::new(),
    )
    .unwrap()
}

#[test]
fn full_session_persists_every_trial() {
    let mut s = session(config(2), participant(1), 1);
    let summary = s.run(&orders(2)).unwrap();

    assert!(summary.completed);
    assert_eq!(summary.trials_completed, 12);
    let sink = s.sink();
    assert_eq!(sink.records.len(), 12);
    assert_eq!(sink.runs.len(), 2);
    assert!(!sink.runs[0].nudge);
    assert!(sink.runs[1].nudge);
    assert_eq!(sink.summary.as_ref(), Some(&summary));

    let rewards: i64 = sink.records.iter().map(|r| r.reward).sum();
    assert_eq!(summary.total_earnings, rewards);
    assert_eq!(sink.records.last().unwrap().total_earnings, rewards);

    for (i, r) in sink.records.iter().enumerate() {
        assert_eq!(r.trial_number, i + 1);
        assert_eq!(r.run, i / 6);
        assert_eq!(r.nudge, r.run == 1);
        if r.condition == Condition::Neutral {
            assert_eq!(r.reward, 0);
        }
    }
    // Budgets match the layout exactly: every staircase is used up.
    for condition in Condition::ALL {
        assert!(s.pool().get(condition).unwrap().is_done());
    }
    assert_eq!(summary.staircase_end, s.pool().snapshot());
}

#[test]
fn rewards_follow_valence() {
    let mut s = session(config(2), participant(5), 5);
    s.run(&orders(2)).unwrap();
    for r in &s.sink().records {
        match r.condition {
            Condition::RewardHigh if r.responded => assert!((5..=7).contains(&r.reward)),
            Condition::RewardLow if r.responded => assert!((1..=3).contains(&r.reward)),
            Condition::LossHigh if !r.responded => assert!((-7..=-5).contains(&r.reward)),
            Condition::LossLow if !r.responded => assert!((-3..=-1).contains(&r.reward)),
            _ => assert_eq!(r.reward, 0),
        }
    }
}

#[test]
fn staircase_levels_are_recorded_per_condition() {
    let mut s = session(config(2), participant(9), 9);
    s.run(&orders(2)).unwrap();
    let records = &s.sink().records;
    for condition in Condition::ALL {
        let mine: Vec<_> = records.iter().filter(|r| r.condition == condition).collect();
        let history = s.pool().get(condition).unwrap().history();
        assert_eq!(mine.len(), history.len());
        for (i, (record, step)) in mine.iter().zip(history).enumerate() {
            assert_eq!(record.staircase_trial, i);
            assert_eq!(record.assigned_level, step.level);
            assert_eq!(record.responded, step.success);
        }
    }
}

#[test]
fn unknown_condition_aborts_before_any_frame() {
    let mut cfg = config(1);
    cfg.staircase.initial_levels.remove(&Condition::LossHigh);
    let mut s = session(cfg, participant(1), 1);
    let err = s.run(&orders(1)).unwrap_err();
    assert!(matches!(err, ExperimentError::UnknownCondition(k) if k == "loss.high"));
    assert_eq!(s.presenter().frames_presented(), 0);
    assert!(s.sink().runs.is_empty());
}

#[test]
fn too_few_orders_is_fatal() {
    let mut s = session(config(3), participant(1), 1);
    let err = s.run(&orders(2)).unwrap_err();
    assert!(matches!(
        err,
        ExperimentError::Order(OrderError::OrderExhausted {
            available: 2,
            required: 3
        })
    ));
    assert_eq!(s.presenter().frames_presented(), 0);
}

#[test]
fn short_order_is_fatal() {
    let mut short = orders(1);
    short[0].trials.truncate(4);
    let mut s = session(config(1), participant(1), 1);
    let err = s.run(&short).unwrap_err();
    assert!(matches!(
        err,
        ExperimentError::Order(OrderError::OrderTooShort { rows: 4, required: 6, .. })
    ));
}

#[test]
fn over_budget_orders_are_rejected_before_any_frame() {
    let mut cfg = config(2);
    cfg.staircase.trials.insert(Condition::Neutral, 3);
    let mut s = session(cfg, participant(1), 1);
    let err = s.run(&orders(2)).unwrap_err();
    assert!(matches!(
        err,
        ExperimentError::Order(OrderError::OverBudget {
            condition: Condition::Neutral,
            rows: 4,
            budget: 3,
        })
    ));
    assert_eq!(s.presenter().frames_presented(), 0);
    assert!(s.sink().runs.is_empty());
    assert!(s.sink().summary.is_none());
}

#[test]
fn orders_exactly_at_budget_run_to_completion() {
    let mut cfg = config(2);
    cfg.staircase.trials.insert(Condition::Neutral, 4);
    let mut s = session(cfg, participant(1), 1);
    let summary = s.run(&orders(2)).unwrap();
    assert!(summary.completed);
    assert!(s.pool().get(Condition::Neutral).unwrap().is_done());
}

#[test]
fn single_run_uses_one_order() {
    let mut cfg = config(3);
    cfg.single_run = true;
    let mut s = session(cfg, participant(2), 2);
    let summary = s.run(&orders(1)).unwrap();
    assert!(summary.completed);
    assert_eq!(s.sink().records.len(), 6);
}

#[test]
fn scanner_mode_waits_for_trigger() {
    let mut cfg = config(1);
    cfg.scanner = true;
    let mut s = session(cfg, participant(4), 4);
    let summary = s.run(&orders(1)).unwrap();
    assert!(summary.completed);
    // run starts 0.5 s after the wait screen appears
    let first = &s.sink().records[0];
    assert_eq!(first.onset, 0.25);
}

#[test]
fn abort_key_cancels_and_persists_state() {
    let profile = ParticipantProfile {
        abort_on_trial: Some(4),
        ..ParticipantProfile::default()
    };
    let responder = SimulatedParticipant::new(profile, StdRng::seed_from_u64(3));
    let mut s = session(config(2), responder, 3);
    let summary = s.run(&orders(2)).unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.trials_completed, 3);
    assert_eq!(s.sink().records.len(), 3);
    assert_eq!(s.sink().summary.as_ref(), Some(&summary));
}

/// Wraps a responder and presses escape at a fixed global time.
struct AbortAt<R> {
    inner: R,
    at: f64,
    sent: bool,
}

impl<R: Responder> Responder for AbortAt<R> {
    fn observe(&mut self, frame: &[Stimulus], now: f64) {
        self.inner.observe(frame, now);
    }

    fn keys_until(&mut self, now: f64) -> Vec<String> {
        let mut keys = self.inner.keys_until(now);
        if !self.sent && now >= self.at {
            self.sent = true;
            keys.push("escape".into());
        }
        keys
    }
}

fn replay(cfg: &ExperimentConfig, condition: Condition, successes: &[bool]) -> f64 {
    let mut s = StaircaseController::new(StaircaseParams {
        initial_level: cfg.staircase.initial_levels[&condition],
        step_sizes: cfg.step_sizes().to_vec(),
        bounds: (cfg.staircase.min_level, cfg.staircase.max_level),
        trials: cfg.trial_budget(condition),
    })
    .unwrap();
    for ok in successes {
        s.add_response(*ok).unwrap();
    }
    s.level()
}

#[test]
fn cancellation_anywhere_leaves_consistent_snapshot() {
    let cfg = config(1);
    // Shortest possible session: the target phase plus its trailing
    // compensation never adds up to less than the response window.
    let per_trial = cfg.cue_duration + 0.125 + cfg.max_response_duration + 0.125
        + cfg.feedback_duration
        + 0.25;
    let min_length = cfg.initial_fixation + 6.0 * per_trial;
    let mut rng = StdRng::seed_from_u64(99);

    for i in 0..1000u64 {
        let at = rng.random_range(0.0..min_length);
        let responder = AbortAt {
            inner: participant(i),
            at,
            sent: false,
        };
        let mut s = session(cfg.clone(), responder, i);
        let summary = s.run(&orders(1)).unwrap();
        assert!(!summary.completed, "abort at {at}");
        assert_eq!(s.sink().summary.as_ref(), Some(&summary));
        assert_eq!(summary.staircase_end, s.pool().snapshot());
        assert_eq!(summary.total_earnings, s.earnings().total());

        let records = &s.sink().records;
        assert_eq!(summary.trials_completed, records.len());
        let mut committed = 0;
        for condition in Condition::ALL {
            let history: Vec<bool> = s
                .pool()
                .get(condition)
                .unwrap()
                .history()
                .iter()
                .map(|h| h.success)
                .collect();
            let persisted = records.iter().filter(|r| r.condition == condition).count();
            // at most the interrupted trial is committed without a record
            assert!(history.len() == persisted || history.len() == persisted + 1);
            committed += history.len();
            assert_eq!(
                summary.staircase_end[&condition],
                replay(&cfg, condition, &history)
            );
        }
        assert!(committed <= records.len() + 1);
    }
}

#[test]
fn start_levels_can_differ_per_condition() {
    let mut cfg = config(1);
    cfg.set_initial_level(Condition::LossHigh, 3.0);
    let mut s = session(cfg, participant(6), 6);
    s.run(&orders(1)).unwrap();
    let first_loss = s
        .sink()
        .records
        .iter()
        .find(|r| r.condition == Condition::LossHigh)
        .unwrap();
    assert_eq!(first_loss.assigned_level, 3.0);
    let expected: BTreeMap<_, _> = s.pool().snapshot();
    assert_eq!(s.sink().summary.as_ref().unwrap().staircase_end, expected);
}
