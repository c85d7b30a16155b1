use crate::Timer;
use mid_core::ClockId;
use std::collections::HashMap;

/// Resettable named clocks measured against one timer.
#[derive(Debug, Clone)]
pub struct ClockSet<T: Timer<Timestamp = u64>> {
    timer: T,
    origins: HashMap<ClockId, u64>,
}

impl<T: Timer<Timestamp = u64>> ClockSet<T> {
    /// All clocks start at the timer's current reading.
    pub fn new(timer: T) -> Self {
        let now = timer.now();
        let origins = ClockId::ALL.iter().map(|id| (*id, now)).collect();
        Self { timer, origins }
    }

    pub fn reset(&mut self, id: ClockId) {
        self.origins.insert(id, self.timer.now());
    }

    /// Seconds since `id` was last reset.
    pub fn elapsed(&self, id: ClockId) -> f64 {
        let origin = self.origins.get(&id).copied().unwrap_or(0);
        self.timer.elapsed(origin).as_secs_f64()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualTimer;
    use std::time::Duration;

    #[test]
    fn clocks_reset_independently() {
        let timer = VirtualTimer::new();
        let mut clocks = ClockSet::new(timer.clone());
        timer.advance(Duration::from_secs(2));
        clocks.reset(ClockId::Phase);
        timer.advance(Duration::from_millis(500));
        assert_eq!(clocks.elapsed(ClockId::Global), 2.5);
        assert_eq!(clocks.elapsed(ClockId::Phase), 0.5);
    }
}
