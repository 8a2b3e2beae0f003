use std::time::{SystemTime, UNIX_EPOCH};

/// Synthetic gauge cycling through `[0, modulus)` in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclingGauge {
    value: f64,
    step: f64,
    modulus: f64,
}

impl CyclingGauge {
    /// Create a gauge starting at zero.
    ///
    /// `step` and `modulus` are expected to be finite and positive, which
    /// keeps the value inside `[0, modulus)`.
    pub fn new(step: f64, modulus: f64) -> Self {
        Self {
            value: 0.0,
            step,
            modulus,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn modulus(&self) -> f64 {
        self.modulus
    }

    /// Move to the next value, wrapping at the modulus.
    ///
    /// Plain floating point addition, so rounding error accumulates over
    /// long runs.
    pub fn advance(&mut self) {
        self.value = (self.value + self.step) % self.modulus;
    }
}

impl Default for CyclingGauge {
    fn default() -> Self {
        Self::new(0.1, 10.0)
    }
}

/// Source of sample timestamps in nanoseconds since the UNIX epoch.
///
/// Never goes backwards, even when the wall clock does.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timestamps {
    last: i64,
}

impl Timestamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, now: SystemTime) -> i64 {
        self.last = self.last.max(timestamp_nanos(now));
        self.last
    }
}

fn timestamp_nanos(timestamp: SystemTime) -> i64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|since| i64::try_from(since.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
