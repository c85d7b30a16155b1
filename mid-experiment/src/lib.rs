pub mod config;
pub mod earnings;
pub mod error;
pub mod orchestrator;
pub mod orders;
pub mod pool;
pub mod presenter;
pub mod record;
pub mod sequencer;
pub mod sim;
pub mod staircase;

pub use config::{BreakConfig, EarningsConfig, ExperimentConfig, RewardRange, StaircaseConfig};
pub use earnings::EarningsRegulator;
pub use error::{ConfigError, ExperimentError, OrderError};
pub use orchestrator::RunOrchestrator;
pub use orders::TrialOrder;
pub use pool::StaircasePool;
pub use presenter::{CancelToken, FramePresenter, Presenter, Responder};
pub use record::{JsonLinesSink, MemorySink, RecordSink, RunHeader, SessionSummary};
pub use sequencer::{
    Feedback, ResponseCapture, SequencerSettings, TrialOutcome, TrialPhaseSequencer, TrialReport,
    TrialScorer,
};
pub use sim::{ParticipantProfile, ScriptedResponder, SimulatedParticipant};
pub use staircase::{Direction, StaircaseController, StaircaseParams};
