pub mod clocks;
pub mod timer;

pub use clocks::ClockSet;
pub use timer::{
    FALLBACK_FRAME_DURATION, HighPrecisionTimer, Timer, VirtualTimer, frame_duration_for_rate,
};
