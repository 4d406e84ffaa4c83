use crate::config::SPEED_PER_TICK;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Results this close to an end stop count as having reached it.
const END_STOP_EPSILON: f64 = 1e-9;

/// Press id no tracker can produce; the first press is always honoured.
const NO_PRESS: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterStatus {
    #[default]
    Idle,
    MovingUp,
    MovingDown,
}

impl ShutterStatus {
    pub fn is_moving(self) -> bool {
        !matches!(self, ShutterStatus::Idle)
    }
}

impl fmt::Display for ShutterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutterStatus::Idle => f.write_str("idle"),
            ShutterStatus::MovingUp => f.write_str("moving_up"),
            ShutterStatus::MovingDown => f.write_str("moving_down"),
        }
    }
}

/// Receives position updates from the simulation loop.
///
/// Called synchronously on the loop thread from inside [`Shutter::tick`].
/// Implementations must hand the value off (queue, atomic store) and return;
/// blocking here stalls every shutter in the bank.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, slot: usize, position: f64);
}

impl<F> ProgressListener for F
where
    F: Fn(usize, f64) + Send + Sync,
{
    fn on_progress(&self, slot: usize, position: f64) {
        self(slot, position)
    }
}

/// One motorized shutter. Position 0.0 is fully up, 1.0 fully down.
pub struct Shutter {
    slot: usize,
    status: ShutterStatus,
    position: f64,
    speed_per_tick: f64,
    last_up_press_id: u64,
    last_down_press_id: u64,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl fmt::Debug for Shutter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shutter")
            .field("slot", &self.slot)
            .field("status", &self.status)
            .field("position", &self.position)
            .field("last_up_press_id", &self.last_up_press_id)
            .field("last_down_press_id", &self.last_down_press_id)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl Shutter {
    pub fn new(slot: usize) -> Self {
        Self::with_speed(slot, SPEED_PER_TICK)
    }

    pub fn with_speed(slot: usize, speed_per_tick: f64) -> Self {
        Self {
            slot,
            status: ShutterStatus::Idle,
            position: 0.0,
            speed_per_tick,
            last_up_press_id: NO_PRESS,
            last_down_press_id: NO_PRESS,
            listener: None,
        }
    }

    /// Places the shutter at `position` (clamped) without notifying.
    pub fn at_position(mut self, position: f64) -> Self {
        self.position = clamp_unit(position);
        self
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn status(&self) -> ShutterStatus {
        self.status
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn last_up_press_id(&self) -> u64 {
        self.last_up_press_id
    }

    pub fn last_down_press_id(&self) -> u64 {
        self.last_down_press_id
    }

    pub fn set_progress_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listener = Some(listener);
    }

    /// Handles an up command for the press cycle `press_id`.
    ///
    /// A moving shutter stops rather than reversing. Repeats of an already
    /// consumed id are ignored; returns whether the command was consumed.
    pub fn move_up(&mut self, press_id: u64) -> bool {
        if press_id == self.last_up_press_id {
            return false;
        }
        self.start_or_stop(ShutterStatus::MovingUp);
        self.last_up_press_id = press_id;
        true
    }

    /// Down counterpart of [`Shutter::move_up`].
    pub fn move_down(&mut self, press_id: u64) -> bool {
        if press_id == self.last_down_press_id {
            return false;
        }
        self.start_or_stop(ShutterStatus::MovingDown);
        self.last_down_press_id = press_id;
        true
    }

    pub fn stop(&mut self) {
        self.status = ShutterStatus::Idle;
    }

    /// Advances one simulation step.
    ///
    /// A step landing within 1e-9 of an end stop snaps to it and idles the
    /// shutter. From `p`, reaching 0.0 takes `ceil(p / speed)` ticks, except
    /// that a `p` less than 1e-9 above a whole number of steps finishes one
    /// tick sooner.
    pub fn tick(&mut self) {
        match self.status {
            ShutterStatus::Idle => return,
            ShutterStatus::MovingUp => {
                let next = self.position - self.speed_per_tick;
                if next <= END_STOP_EPSILON {
                    self.position = 0.0;
                    self.stop();
                } else {
                    self.position = next;
                }
            }
            ShutterStatus::MovingDown => {
                let next = self.position + self.speed_per_tick;
                if next >= 1.0 - END_STOP_EPSILON {
                    self.position = 1.0;
                    self.stop();
                } else {
                    self.position = next;
                }
            }
        }
        if let Some(listener) = &self.listener {
            listener.on_progress(self.slot, self.position);
        }
    }

    fn start_or_stop(&mut self, moving: ShutterStatus) {
        if self.status.is_moving() {
            self.stop();
        } else {
            self.status = moving;
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
