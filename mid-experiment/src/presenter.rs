use mid_core::{ClockId, Stimulus};
use mid_timing::{ClockSet, Timer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Display and input surface the sequencer drives. `present` blocks until
/// the next display sync and is the only point where time passes.
pub trait Presenter {
    fn draw(&mut self, stimulus: &Stimulus);
    fn present(&mut self);
    /// Keys pressed since the last poll, oldest first.
    fn poll_keys(&mut self) -> Vec<String>;
    fn elapsed(&self, clock: ClockId) -> f64;
    fn reset_clock(&mut self, clock: ClockId);
}

/// Shared abort flag, checked at every frame.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source of key presses for a headless presenter.
pub trait Responder {
    /// Called once per frame with what is on screen and the presenter's
    /// monotonic time in seconds.
    fn observe(&mut self, frame: &[Stimulus], now: f64);
    /// Keys pressed at or before `now` (same time base) not yet reported.
    fn keys_until(&mut self, now: f64) -> Vec<String>;
}

/// Presenter without a window: each `present` waits one frame on the timer.
///
/// Paired with `VirtualTimer` a whole session runs instantly and
/// deterministically; with `HighPrecisionTimer` it paces in real time.
pub struct FramePresenter<T: Timer<Timestamp = u64>, R: Responder> {
    clocks: ClockSet<T>,
    responder: R,
    frame: Duration,
    pending: Vec<Stimulus>,
    frames_presented: u64,
}

impl<T: Timer<Timestamp = u64>, R: Responder> FramePresenter<T, R> {
    pub fn new(timer: T, responder: R, frame_duration: f64) -> Self {
        Self {
            clocks: ClockSet::new(timer),
            responder,
            frame: Duration::from_secs_f64(frame_duration),
            pending: Vec::new(),
            frames_presented: 0,
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }

    /// Seconds on the timer itself; unaffected by clock resets.
    fn monotonic(&self) -> f64 {
        Duration::from_nanos(self.clocks.timer().now()).as_secs_f64()
    }
}

impl<T: Timer<Timestamp = u64>, R: Responder> Presenter for FramePresenter<T, R> {
    fn draw(&mut self, stimulus: &Stimulus) {
        self.pending.push(stimulus.clone());
    }

    fn present(&mut self) {
        let now = self.monotonic();
        self.responder.observe(&self.pending, now);
        self.pending.clear();

        self.clocks.timer().sleep(self.frame);
        self.frames_presented += 1;
    }

    fn poll_keys(&mut self) -> Vec<String> {
        let now = self.monotonic();
        self.responder.keys_until(now)
    }

    fn elapsed(&self, clock: ClockId) -> f64 {
        self.clocks.elapsed(clock)
    }

    fn reset_clock(&mut self, clock: ClockId) {
        self.clocks.reset(clock);
    }
}
