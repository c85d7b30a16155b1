/// Fixed-order segments of one trial.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrialPhase {
    Cue,
    FixAfterCue,
    Target,
    FixAfterTarget,
    Feedback,
    FixAfterFeedback,
}

impl Default for TrialPhase {
    fn default() -> Self {
        TrialPhase::Cue
    }
}

impl TrialPhase {
    pub const ORDER: [TrialPhase; 6] = [
        TrialPhase::Cue,
        TrialPhase::FixAfterCue,
        TrialPhase::Target,
        TrialPhase::FixAfterTarget,
        TrialPhase::Feedback,
        TrialPhase::FixAfterFeedback,
    ];

    /// Phase that follows this one, `None` once the trial is complete.
    pub fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            Cue => FixAfterCue,
            FixAfterCue => Target,
            Target => FixAfterTarget,
            FixAfterTarget => Feedback,
            Feedback => FixAfterFeedback,
            FixAfterFeedback => return None,
        })
    }

    /// Phases whose key presses are noted (feedback is presentation only).
    pub fn captures_input(&self) -> bool {
        !matches!(self, Self::Feedback)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrialPhase::Cue => "cue",
            TrialPhase::FixAfterCue => "fix.after.cue",
            TrialPhase::Target => "target",
            TrialPhase::FixAfterTarget => "fix.after.stim",
            TrialPhase::Feedback => "feedback",
            TrialPhase::FixAfterFeedback => "fix.after.feedback",
        }
    }
}

/// Lifecycle of one component (stimulus or response window) inside a phase.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum ActorStatus {
    #[default]
    NotStarted,
    Active,
    Finished,
}

impl ActorStatus {
    /// True once every actor has finished.
    pub fn all_finished(actors: &[ActorStatus]) -> bool {
        actors.iter().all(|a| *a == ActorStatus::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_walk_in_fixed_order() {
        let mut walked = vec![TrialPhase::default()];
        while let Some(next) = walked.last().and_then(|p| p.next()) {
            walked.push(next);
        }
        assert_eq!(walked, TrialPhase::ORDER);
    }

    #[test]
    fn completion_needs_every_actor() {
        use ActorStatus::*;
        assert!(ActorStatus::all_finished(&[Finished, Finished]));
        assert!(!ActorStatus::all_finished(&[Finished, Active]));
        assert!(!ActorStatus::all_finished(&[NotStarted]));
    }
}
