//! Key sources for running sessions without a participant at a keyboard.

use crate::presenter::Responder;
use mid_core::Stimulus;
use rand::Rng;
use std::collections::VecDeque;

/// Presses fixed keys at fixed global times.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponder {
    presses: VecDeque<(f64, String)>,
}

impl ScriptedResponder {
    pub fn new(mut presses: Vec<(f64, String)>) -> Self {
        presses.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            presses: presses.into(),
        }
    }

    pub fn push(&mut self, at: f64, key: impl Into<String>) {
        let idx = self.presses.partition_point(|(t, _)| *t <= at);
        self.presses.insert(idx, (at, key.into()));
    }
}

impl Responder for ScriptedResponder {
    fn observe(&mut self, _frame: &[Stimulus], _now: f64) {}

    fn keys_until(&mut self, now: f64) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some((t, _)) = self.presses.front() {
            if *t > now {
                break;
            }
            if let Some((_, key)) = self.presses.pop_front() {
                keys.push(key);
            }
        }
        keys
    }
}

/// Behaviour of a simulated observer.
#[derive(Debug, Clone)]
pub struct ParticipantProfile {
    /// Visible target time (s) detected half of the time.
    pub threshold: f64,
    /// Width of the logistic psychometric function (s).
    pub slope: f64,
    /// Reaction times are drawn uniformly from this range (s).
    pub reaction_time: (f64, f64),
    /// Chance of an anticipatory press while the cue is up.
    pub anticipation: f64,
    pub response_key: String,
    pub escape_key: String,
    /// Press escape when this trial's cue appears (1-based).
    pub abort_on_trial: Option<usize>,
    /// Key sent this long after any text screen appears, standing in for
    /// the operator or the scanner trigger.
    pub trigger: Option<(f64, String)>,
}

impl Default for ParticipantProfile {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            slope: 0.04,
            reaction_time: (0.18, 0.45),
            anticipation: 0.02,
            response_key: "space".into(),
            escape_key: "escape".into(),
            abort_on_trial: None,
            trigger: Some((0.5, "enter".into())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTarget {
    onset: f64,
    offset: Option<f64>,
    press_at: f64,
}

/// Participant that detects the target with a probability rising with its
/// visible duration and answers after a sampled reaction time.
#[derive(Debug, Clone)]
pub struct SimulatedParticipant<R: Rng> {
    profile: ParticipantProfile,
    rng: R,
    presses: ScriptedResponder,
    cue_visible: bool,
    text_visible: bool,
    target_visible: bool,
    target: Option<PendingTarget>,
    trials_seen: usize,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(profile: ParticipantProfile, rng: R) -> Self {
        Self {
            profile,
            rng,
            presses: ScriptedResponder::default(),
            cue_visible: false,
            text_visible: false,
            target_visible: false,
            target: None,
            trials_seen: 0,
        }
    }

    /// Probability of detecting a target visible for `secs`.
    pub fn detection_probability(&self, secs: f64) -> f64 {
        1.0 / (1.0 + (-(secs - self.profile.threshold) / self.profile.slope).exp())
    }

    pub fn trials_seen(&self) -> usize {
        self.trials_seen
    }

    fn on_cue_onset(&mut self, now: f64) {
        self.trials_seen += 1;
        if self.profile.abort_on_trial == Some(self.trials_seen) {
            self.presses.push(now, self.profile.escape_key.clone());
            return;
        }
        if self.rng.random_bool(self.profile.anticipation.clamp(0.0, 1.0)) {
            let at = now + self.rng.random_range(0.0..0.5);
            self.presses.push(at, self.profile.response_key.clone());
        }
    }

    fn settle_target(&mut self, now: f64) {
        let Some(pending) = self.target else {
            return;
        };
        if now < pending.press_at {
            return;
        }
        let visible = pending.offset.unwrap_or(now).min(pending.press_at) - pending.onset;
        let p = self.detection_probability(visible);
        if self.rng.random_bool(p.clamp(0.0, 1.0)) {
            self.presses
                .push(pending.press_at, self.profile.response_key.clone());
        }
        self.target = None;
    }
}

impl<R: Rng> Responder for SimulatedParticipant<R> {
    fn observe(&mut self, frame: &[Stimulus], now: f64) {
        let cue = frame.iter().any(|s| matches!(s, Stimulus::Cue(_)));
        if cue && !self.cue_visible {
            self.on_cue_onset(now);
        }
        self.cue_visible = cue;

        let text = frame.iter().any(|s| matches!(s, Stimulus::Text(_)));
        if text && !self.text_visible {
            if let Some((delay, key)) = &self.profile.trigger {
                self.presses.push(now + delay, key.clone());
            }
        }
        self.text_visible = text;

        let target = frame.iter().any(Stimulus::is_target);
        if target && !self.target_visible {
            let (lo, hi) = self.profile.reaction_time;
            let rt = if hi > lo { self.rng.random_range(lo..hi) } else { lo };
            self.target = Some(PendingTarget {
                onset: now,
                offset: None,
                press_at: now + rt,
            });
        } else if !target && self.target_visible {
            if let Some(pending) = self.target.as_mut() {
                pending.offset = Some(now);
            }
        }
        self.target_visible = target;
        self.settle_target(now);
    }

    fn keys_until(&mut self, now: f64) -> Vec<String> {
        self.settle_target(now);
        self.presses.keys_until(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mid_core::Condition;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn scripted_keys_release_in_time_order() {
        let mut r = ScriptedResponder::new(vec![(0.5, "b".into()), (0.2, "a".into())]);
        assert!(r.keys_until(0.1).is_empty());
        assert_eq!(r.keys_until(0.2), vec!["a".to_string()]);
        r.push(0.3, "c");
        assert_eq!(r.keys_until(1.0), vec!["c".to_string(), "b".to_string()]);
        assert!(r.keys_until(2.0).is_empty());
    }

    #[test]
    fn detection_rises_with_visible_time() {
        let p = SimulatedParticipant::new(ParticipantProfile::default(), StdRng::seed_from_u64(0));
        assert!(p.detection_probability(0.1) < 0.05);
        assert!((p.detection_probability(0.25) - 0.5).abs() < 1e-12);
        assert!(p.detection_probability(0.45) > 0.95);
    }

    #[test]
    fn sure_detection_presses_after_reaction_time() {
        let profile = ParticipantProfile {
            threshold: 0.0,
            slope: 1e-6,
            reaction_time: (0.3, 0.3),
            anticipation: 0.0,
            ..ParticipantProfile::default()
        };
        let mut p = SimulatedParticipant::new(profile, StdRng::seed_from_u64(0));
        p.observe(&[Stimulus::Target], 1.0);
        assert!(p.keys_until(1.2).is_empty());
        p.observe(&[Stimulus::Fixation], 1.2);
        assert_eq!(p.keys_until(1.5), vec!["space".to_string()]);
    }

    #[test]
    fn aborts_on_requested_trial() {
        let profile = ParticipantProfile {
            anticipation: 0.0,
            abort_on_trial: Some(2),
            ..ParticipantProfile::default()
        };
        let mut p = SimulatedParticipant::new(profile, StdRng::seed_from_u64(0));
        let cue = [Stimulus::Cue(Condition::Neutral)];
        p.observe(&cue, 0.0);
        p.observe(&[Stimulus::Fixation], 1.0);
        assert!(p.keys_until(1.0).is_empty());
        p.observe(&cue, 5.0);
        assert_eq!(p.keys_until(5.0), vec!["escape".to_string()]);
        assert_eq!(p.trials_seen(), 2);
    }

    #[test]
    fn text_screens_get_a_trigger() {
        let mut p = SimulatedParticipant::new(ParticipantProfile::default(), StdRng::seed_from_u64(0));
        p.observe(&[Stimulus::Text("wait".into())], 2.0);
        assert!(p.keys_until(2.4).is_empty());
        assert_eq!(p.keys_until(2.5), vec!["enter".to_string()]);
    }
}
