pub mod clock;
pub mod condition;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use clock::ClockId;
pub use condition::{Condition, ParseConditionError, Valence};
pub use phase::{ActorStatus, TrialPhase};
pub use stimulus::Stimulus;
pub use trial::{PhaseTimings, TrialRecord, TrialSpec};
