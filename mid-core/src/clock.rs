/// Named clocks the sequencer reads and resets through the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClockId {
    /// Since the first run started.
    Global,
    /// Since the current run started.
    Run,
    /// Since the current trial started.
    Trial,
    /// Since the current phase started.
    Phase,
}

impl ClockId {
    pub const ALL: [ClockId; 4] = [
        ClockId::Global,
        ClockId::Run,
        ClockId::Trial,
        ClockId::Phase,
    ];
}
