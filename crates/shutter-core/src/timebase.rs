use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Shared monotonic origin for hold timing and tick scheduling.
///
/// Copies share the same origin, so a tracker written from the input thread
/// and a loop reading on its own thread agree on what "now" means.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since Unix epoch (for audit records only).
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn duration_us(duration: Duration) -> u64 {
    duration.as_micros() as u64
}
