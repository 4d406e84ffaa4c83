use crate::config::MAX_SHUTTERS;
use crate::shutter::ShutterStatus;
use parking_lot::Mutex;
use serde::Serialize;

/// Bank state as of the latest tick, published by the simulation loop.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BankSnapshot {
    pub timestamp_us: u64,
    pub tick_count: u64,
    pub iterations: u64,
    pub broadcasts: u64,
    pub stops: u64,
    pub slot_count: usize,
    pub(crate) positions: [f64; MAX_SHUTTERS],
    pub(crate) statuses: [ShutterStatus; MAX_SHUTTERS],
}

impl BankSnapshot {
    pub(crate) fn set_slot(&mut self, slot: usize, position: f64, status: ShutterStatus) {
        self.positions[slot] = position;
        self.statuses[slot] = status;
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions[..self.slot_count]
    }

    pub fn statuses(&self) -> &[ShutterStatus] {
        &self.statuses[..self.slot_count]
    }

    pub fn moving_count(&self) -> usize {
        self.statuses().iter().filter(|s| s.is_moving()).count()
    }
}

/// Latest-value hand-off of [`BankSnapshot`]s from the loop to observers.
///
/// The loop publishes at most once per tick and readers copy the value out,
/// so the lock is held only for a single copy on either side.
pub struct BankExchange {
    latest: Mutex<BankSnapshot>,
}

impl BankExchange {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(BankSnapshot::default()),
        }
    }

    /// Called by the simulation loop after every tick and once on exit.
    pub fn publish(&self, snapshot: BankSnapshot) {
        *self.latest.lock() = snapshot;
    }

    /// Called by observers (metrics, summary).
    pub fn read(&self) -> BankSnapshot {
        *self.latest.lock()
    }
}

impl Default for BankExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_latest_publish() {
        let exchange = BankExchange::new();
        assert_eq!(exchange.read().tick_count, 0);

        for tick in 1..=5 {
            let mut snapshot = BankSnapshot {
                tick_count: tick,
                slot_count: 2,
                ..Default::default()
            };
            snapshot.set_slot(1, tick as f64 / 10.0, ShutterStatus::MovingDown);
            exchange.publish(snapshot);
        }

        let latest = exchange.read();
        assert_eq!(latest.tick_count, 5);
        assert_eq!(latest.positions(), &[0.0, 0.5]);
        assert_eq!(latest.moving_count(), 1);
    }

    #[test]
    fn concurrent_reads_never_mix_publishes() {
        use std::sync::Arc;
        use std::thread;

        let exchange = Arc::new(BankExchange::new());
        let writer_exchange = Arc::clone(&exchange);
        let writer = thread::spawn(move || {
            for tick in 1..=20_000u64 {
                let mut snapshot = BankSnapshot {
                    tick_count: tick,
                    slot_count: MAX_SHUTTERS,
                    ..Default::default()
                };
                for slot in 0..MAX_SHUTTERS {
                    snapshot.set_slot(slot, tick as f64, ShutterStatus::MovingDown);
                }
                writer_exchange.publish(snapshot);
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let exchange = Arc::clone(&exchange);
                thread::spawn(move || {
                    for _ in 0..20_000 {
                        let snapshot = exchange.read();
                        let expected = snapshot.tick_count as f64;
                        assert!(snapshot.positions().iter().all(|p| *p == expected));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(exchange.read().tick_count, 20_000);
    }

    #[test]
    fn snapshot_serializes_visible_slots() {
        let mut snapshot = BankSnapshot {
            slot_count: 1,
            ..Default::default()
        };
        snapshot.set_slot(0, 0.25, ShutterStatus::MovingUp);
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["slot_count"], 1);
        assert_eq!(json["statuses"][0], "moving_up");
    }
}
