use crate::Condition;

/// What the presenter is asked to draw for the coming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    Blank,
    Fixation,
    Cue(Condition),
    Target,
    Feedback { trial: String, total: String },
    Text(String),
}

impl Stimulus {
    pub fn is_target(&self) -> bool {
        matches!(self, Stimulus::Target)
    }
}
