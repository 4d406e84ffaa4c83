use crate::press::{Direction, PressTracker};
use crate::timebase::TimeBase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Up and down controls of one slot.
#[derive(Debug)]
pub struct SlotControls {
    pub up: PressTracker,
    pub down: PressTracker,
}

impl SlotControls {
    fn new(timebase: TimeBase) -> Self {
        Self {
            up: PressTracker::new(timebase),
            down: PressTracker::new(timebase),
        }
    }

    pub fn tracker(&self, direction: Direction) -> &PressTracker {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// Input side of the bank, shared between the presentation layer and the
/// simulation loop. Cloning is cheap and every clone sees the same controls.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    slots: Arc<[SlotControls]>,
    stop: Arc<AtomicBool>,
    timebase: TimeBase,
}

impl ControlPanel {
    pub fn new(slot_count: usize, timebase: TimeBase) -> Self {
        let slots: Vec<SlotControls> = (0..slot_count)
            .map(|_| SlotControls::new(timebase))
            .collect();
        Self {
            slots: slots.into(),
            stop: Arc::new(AtomicBool::new(false)),
            timebase,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn timebase(&self) -> TimeBase {
        self.timebase
    }

    /// # Panics
    ///
    /// Panics if `slot` is outside the bank.
    pub fn slot(&self, slot: usize) -> &SlotControls {
        assert!(
            slot < self.slots.len(),
            "slot {slot} out of range for a bank of {} shutters",
            self.slots.len()
        );
        &self.slots[slot]
    }

    pub fn slots(&self) -> &[SlotControls] {
        &self.slots
    }

    /// # Panics
    ///
    /// Panics if `slot` is outside the bank.
    pub fn press(&self, slot: usize, direction: Direction) {
        self.slot(slot).tracker(direction).press();
    }

    /// # Panics
    ///
    /// Panics if `slot` is outside the bank.
    pub fn release(&self, slot: usize, direction: Direction) {
        self.slot(slot).tracker(direction).release();
    }

    /// Asks the simulation loop to exit after its current iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
