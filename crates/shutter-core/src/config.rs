use crate::timebase::duration_us;
use std::time::Duration;

/// Number of shutter slots in the bank.
pub const SHUTTER_COUNT: usize = 10;

/// Upper bound on slots a snapshot can carry.
pub const MAX_SHUTTERS: usize = 32;

/// Travel per tick, in position units (full travel is 1.0).
pub const SPEED_PER_TICK: f64 = 0.005;

#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Minimum spacing between tick boundaries.
    pub tick_interval: Duration,
    /// Hold time after which a single control commands the whole bank.
    pub long_press_threshold: Duration,
    pub speed_per_tick: f64,
    pub shutter_count: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            long_press_threshold: Duration::from_millis(1000),
            speed_per_tick: SPEED_PER_TICK,
            shutter_count: SHUTTER_COUNT,
        }
    }
}

impl SimConfig {
    pub(crate) fn tick_interval_us(&self) -> u64 {
        duration_us(self.tick_interval)
    }

    pub(crate) fn long_press_us(&self) -> u64 {
        duration_us(self.long_press_threshold)
    }
}
