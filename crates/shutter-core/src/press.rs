use crate::timebase::TimeBase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Press/release state of one physical control.
///
/// Written from the input thread, read from the simulation loop. Each field
/// has a single writer. Readers treat the stored hold start as the source of
/// truth for hold time, so a release racing a read never yields a hold
/// measured from the time base origin.
#[derive(Debug)]
pub struct PressTracker {
    pressed: AtomicBool,
    press_id: AtomicU64,
    /// Press time plus one, in microseconds since the shared [`TimeBase`]
    /// origin; 0 while released.
    hold_start_us: AtomicU64,
    timebase: TimeBase,
}

impl PressTracker {
    pub fn new(timebase: TimeBase) -> Self {
        Self {
            pressed: AtomicBool::new(false),
            press_id: AtomicU64::new(0),
            hold_start_us: AtomicU64::new(0),
            timebase,
        }
    }

    pub fn press(&self) {
        self.press_at(self.timebase.now_us());
    }

    /// Press with an explicit timestamp on the tracker's time base.
    ///
    /// No-op while already pressed: the original hold start is kept.
    pub fn press_at(&self, now_us: u64) {
        if !self.pressed.load(Ordering::Acquire) {
            self.hold_start_us
                .store(now_us.saturating_add(1), Ordering::Release);
            self.pressed.store(true, Ordering::Release);
        }
    }

    /// Ends the current press cycle. The id advances on every call, even
    /// when the control was not pressed.
    pub fn release(&self) {
        self.pressed.store(false, Ordering::Release);
        self.hold_start_us.store(0, Ordering::Release);
        self.press_id.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }

    pub fn press_id(&self) -> u64 {
        self.press_id.load(Ordering::Acquire)
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_micros(self.hold_duration_at(self.timebase.now_us()))
    }

    /// Hold time in microseconds as of `now_us`; zero when released.
    ///
    /// A start that changes under the read means a release (and possibly a
    /// new press) is in flight; that read reports zero.
    pub fn hold_duration_at(&self, now_us: u64) -> u64 {
        let start = self.hold_start_us.load(Ordering::Acquire);
        if start == 0 || !self.is_pressed() {
            return 0;
        }
        if self.hold_start_us.load(Ordering::Acquire) != start {
            return 0;
        }
        now_us.saturating_sub(start - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_then_release_clears_hold() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press();
        tracker.release();
        assert!(!tracker.is_pressed());
        assert_eq!(tracker.hold_duration(), Duration::ZERO);
        assert_eq!(tracker.press_id(), 1);
    }

    #[test]
    fn repeated_press_keeps_hold_start() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press_at(1_000);
        tracker.press_at(5_000);
        assert_eq!(tracker.hold_duration_at(6_000), 5_000);
        assert_eq!(tracker.press_id(), 0);
    }

    #[test]
    fn id_is_stable_while_held() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press_at(10);
        let id = tracker.press_id();
        tracker.press_at(20);
        assert_eq!(tracker.press_id(), id);
        tracker.release();
        assert_eq!(tracker.press_id(), id + 1);
    }

    #[test]
    fn double_release_still_advances_id() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.release();
        tracker.release();
        assert_eq!(tracker.press_id(), 2);
    }

    #[test]
    fn hold_is_zero_once_start_is_cleared() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press_at(5);
        assert_eq!(tracker.hold_duration_at(2_000_005), 2_000_000);

        // Midway through a release: start cleared, flag not yet observed.
        tracker.hold_start_us.store(0, Ordering::Release);
        assert!(tracker.is_pressed());
        assert_eq!(tracker.hold_duration_at(2_000_005), 0);
    }

    #[test]
    fn press_at_origin_keeps_exact_hold() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press_at(0);
        assert_eq!(tracker.hold_duration_at(1_000_001), 1_000_001);
    }

    #[test]
    fn hold_measured_on_monotonic_clock() {
        let tracker = PressTracker::new(TimeBase::new());
        tracker.press();
        std::thread::sleep(Duration::from_millis(5));
        assert!(tracker.hold_duration() >= Duration::from_millis(5));
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.to_string(), "down");
    }
}
