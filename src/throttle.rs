use std::time::{Duration, Instant};

/// Admits at most one log line per window.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    window: Duration,
    last: Instant,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            last: now,
            suppressed: 0,
        }
    }

    /// Returns true once more than `window` has passed since the last
    /// admitted event, and restarts the window.
    ///
    /// A zero window admits every event.
    pub fn ready(&mut self, now: Instant) -> bool {
        if self.window.is_zero() || now.saturating_duration_since(self.last) > self.window {
            self.last = now;
            true
        } else {
            false
        }
    }

    /// Record an event that was not logged.
    pub fn suppress(&mut self) {
        self.suppressed += 1;
    }

    /// Number of events suppressed since the last call.
    pub fn take_suppressed(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed)
    }
}
