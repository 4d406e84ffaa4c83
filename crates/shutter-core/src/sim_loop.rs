use crate::config::{SimConfig, MAX_SHUTTERS};
use crate::panel::ControlPanel;
use crate::press::Direction;
use crate::shutter::{ProgressListener, Shutter};
use crate::sync::{BankExchange, BankSnapshot};
use crate::timebase::TimeBase;
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone, Default, Debug)]
pub struct ExecutionStats {
    pub iterations: u64,
    pub ticks: u64,
    /// Move commands that changed a shutter's state machine.
    pub commands_applied: u64,
    /// Long-press broadcasts, counted once per physical press.
    pub broadcasts: u64,
    /// Both-pressed stops that halted a moving shutter.
    pub stops: u64,
}

/// Polls the control panel and drives every shutter in the bank.
///
/// The loop is the only owner of shutter state. Input arrives through the
/// shared [`ControlPanel`]; output leaves through progress listeners and
/// the [`BankExchange`].
pub struct SimulationLoop {
    config: SimConfig,
    panel: ControlPanel,
    shutters: Vec<Shutter>,
    exchange: Arc<BankExchange>,
    timebase: TimeBase,
    stats: ExecutionStats,
    last_tick_us: u64,
    last_broadcast: Option<(Direction, usize, u64)>,
}

impl SimulationLoop {
    pub fn new(config: SimConfig, panel: ControlPanel, exchange: Arc<BankExchange>) -> Self {
        let shutters = (0..config.shutter_count)
            .map(|slot| Shutter::with_speed(slot, config.speed_per_tick))
            .collect();
        Self::with_shutters(config, panel, exchange, shutters)
    }

    /// Builds a loop over pre-positioned shutters, one per panel slot.
    ///
    /// # Panics
    ///
    /// Panics if the panel, config and shutter list disagree on the bank
    /// size, or the bank is larger than a snapshot can carry.
    pub fn with_shutters(
        config: SimConfig,
        panel: ControlPanel,
        exchange: Arc<BankExchange>,
        shutters: Vec<Shutter>,
    ) -> Self {
        assert_eq!(panel.slot_count(), config.shutter_count, "panel size");
        assert_eq!(shutters.len(), config.shutter_count, "shutter count");
        assert!(config.shutter_count <= MAX_SHUTTERS, "bank too large");
        let timebase = panel.timebase();
        Self {
            config,
            panel,
            shutters,
            exchange,
            timebase,
            stats: ExecutionStats::default(),
            last_tick_us: 0,
            last_broadcast: None,
        }
    }

    /// Installs `listener` on every shutter.
    pub fn set_progress_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        for shutter in &mut self.shutters {
            shutter.set_progress_listener(Arc::clone(&listener));
        }
    }

    pub fn shutters(&self) -> &[Shutter] {
        &self.shutters
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Busy-polls until the panel's stop flag is raised, then publishes the
    /// final bank state.
    pub fn run(&mut self) {
        info!(
            "simulation loop started: {} shutters, tick {:?}, long press {:?}",
            self.shutters.len(),
            self.config.tick_interval,
            self.config.long_press_threshold
        );

        while !self.panel.stop_requested() {
            let now_us = self.timebase.now_us();
            self.step(now_us);
            std::hint::spin_loop();
        }
        self.finish(self.timebase.now_us());

        info!("simulation loop stopped: {:?}", self.stats);
    }

    /// One loop iteration at `now_us` on the panel's time base.
    ///
    /// Applies the current control state to every slot, then advances each
    /// shutter if this iteration falls on a tick boundary. Returns whether
    /// it did.
    pub fn step(&mut self, now_us: u64) -> bool {
        self.stats.iterations += 1;

        let tick = now_us.saturating_sub(self.last_tick_us) > self.config.tick_interval_us();
        if tick {
            self.last_tick_us = now_us;
        }

        for slot in 0..self.shutters.len() {
            self.apply_controls(slot, now_us);
            if tick {
                self.shutters[slot].tick();
            }
        }

        if tick {
            self.stats.ticks += 1;
            self.publish(now_us);
        }
        tick
    }

    /// Publishes the bank as it stands at `now_us`, including commands
    /// applied since the last tick.
    pub fn finish(&self, now_us: u64) {
        self.publish(now_us);
    }

    fn apply_controls(&mut self, slot: usize, now_us: u64) {
        let controls = self.panel.slot(slot);
        let up = controls.up.is_pressed();
        let down = controls.down.is_pressed();

        match (up, down) {
            (false, false) => {}
            (true, false) => self.command(slot, Direction::Up, now_us),
            (false, true) => self.command(slot, Direction::Down, now_us),
            (true, true) => {
                let shutter = &mut self.shutters[slot];
                if shutter.status().is_moving() {
                    self.stats.stops += 1;
                }
                shutter.stop();
            }
        }
    }

    fn command(&mut self, slot: usize, direction: Direction, now_us: u64) {
        let tracker = self.panel.slot(slot).tracker(direction);
        let press_id = tracker.press_id();
        let held_us = tracker.hold_duration_at(now_us);

        if held_us > self.config.long_press_us() {
            self.note_broadcast(slot, direction, press_id);
            for shutter in &mut self.shutters {
                if issue(shutter, direction, press_id) {
                    self.stats.commands_applied += 1;
                }
            }
        } else if issue(&mut self.shutters[slot], direction, press_id) {
            self.stats.commands_applied += 1;
        }
    }

    fn note_broadcast(&mut self, slot: usize, direction: Direction, press_id: u64) {
        let key = (direction, slot, press_id);
        if self.last_broadcast != Some(key) {
            self.last_broadcast = Some(key);
            self.stats.broadcasts += 1;
            debug!("broadcast move {direction} from slot {slot} (press {press_id})");
        }
    }

    fn publish(&self, now_us: u64) {
        let mut snapshot = BankSnapshot {
            timestamp_us: now_us,
            tick_count: self.stats.ticks,
            iterations: self.stats.iterations,
            broadcasts: self.stats.broadcasts,
            stops: self.stats.stops,
            slot_count: self.shutters.len(),
            ..Default::default()
        };
        for shutter in &self.shutters {
            snapshot.set_slot(shutter.slot(), shutter.position(), shutter.status());
        }
        self.exchange.publish(snapshot);
    }
}

fn issue(shutter: &mut Shutter, direction: Direction, press_id: u64) -> bool {
    match direction {
        Direction::Up => shutter.move_up(press_id),
        Direction::Down => shutter.move_down(press_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutter::ShutterStatus;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    const TICK: u64 = 10_001;

    fn bank(positions: f64) -> (SimulationLoop, ControlPanel, Arc<BankExchange>) {
        let config = SimConfig::default();
        let panel = ControlPanel::new(config.shutter_count, TimeBase::new());
        let exchange = Arc::new(BankExchange::new());
        let shutters = (0..config.shutter_count)
            .map(|slot| Shutter::new(slot).at_position(positions))
            .collect();
        let sim = SimulationLoop::with_shutters(config, panel.clone(), Arc::clone(&exchange), shutters);
        (sim, panel, exchange)
    }

    #[test]
    fn ticks_only_after_interval_elapses() {
        let (mut sim, _panel, _exchange) = bank(0.0);
        assert!(!sim.step(5_000));
        assert!(!sim.step(10_000));
        assert!(sim.step(10_001));
        assert!(!sim.step(20_001));
        assert!(sim.step(20_002));
        assert_eq!(sim.stats().ticks, 2);
        assert_eq!(sim.stats().iterations, 5);
    }

    #[test]
    fn short_press_moves_only_its_slot() {
        let (mut sim, panel, _exchange) = bank(0.0);
        panel.slot(2).down.press_at(0);
        sim.step(TICK);

        assert_eq!(sim.shutters()[2].status(), ShutterStatus::MovingDown);
        assert!((sim.shutters()[2].position() - 0.005).abs() < 1e-12);
        for (slot, shutter) in sim.shutters().iter().enumerate() {
            if slot != 2 {
                assert_eq!(shutter.status(), ShutterStatus::Idle);
                assert_eq!(shutter.position(), 0.0);
            }
        }
    }

    #[test]
    fn held_press_does_not_flicker() {
        let (mut sim, panel, _exchange) = bank(0.0);
        panel.slot(0).down.press_at(0);
        for i in 1..=50 {
            sim.step(i * TICK);
            assert_eq!(sim.shutters()[0].status(), ShutterStatus::MovingDown);
        }
        assert!((sim.shutters()[0].position() - 0.25).abs() < 1e-9);
        assert_eq!(sim.stats().commands_applied, 1);
    }

    #[test]
    fn second_press_stops_a_moving_shutter() {
        let (mut sim, panel, _exchange) = bank(0.0);
        panel.slot(1).down.press_at(0);
        sim.step(TICK);
        panel.release(1, Direction::Down);
        sim.step(2 * TICK);
        assert_eq!(sim.shutters()[1].status(), ShutterStatus::MovingDown);

        panel.slot(1).down.press_at(2 * TICK);
        sim.step(3 * TICK);
        assert_eq!(sim.shutters()[1].status(), ShutterStatus::Idle);
        let parked = sim.shutters()[1].position();

        sim.step(4 * TICK);
        assert_eq!(sim.shutters()[1].position(), parked);
    }

    #[test]
    fn long_press_up_moves_whole_bank_in_lockstep() {
        let (mut sim, panel, exchange) = bank(0.5);
        // Land the broadcast between tick boundaries so every shutter
        // starts moving on the same tick.
        sim.step(995_000);
        panel.slot(3).up.press_at(0);

        let start = 1_000_001;
        assert!(!sim.step(start));
        for shutter in sim.shutters() {
            assert_eq!(shutter.status(), ShutterStatus::MovingUp);
            assert_eq!(shutter.last_up_press_id(), 0);
        }

        for i in 1..=20 {
            sim.step(start + i * TICK);
        }
        let reference = sim.shutters()[0].position();
        assert!(reference < 0.5);
        for shutter in sim.shutters() {
            assert_eq!(shutter.position(), reference);
            assert_eq!(shutter.status(), ShutterStatus::MovingUp);
        }
        assert_eq!(sim.stats().broadcasts, 1);
        assert_eq!(exchange.read().moving_count(), 10);
    }

    #[test]
    fn hold_at_threshold_is_still_short() {
        let (mut sim, panel, _exchange) = bank(0.5);
        panel.slot(0).down.press_at(0);
        sim.step(1_000_000);
        assert_eq!(sim.shutters()[0].status(), ShutterStatus::MovingDown);
        assert_eq!(sim.shutters()[1].status(), ShutterStatus::Idle);
        assert_eq!(sim.stats().broadcasts, 0);
    }

    #[test]
    fn both_pressed_stops_only_that_slot() {
        let (mut sim, panel, _exchange) = bank(0.0);
        panel.slot(5).down.press_at(0);
        panel.slot(7).down.press_at(0);
        sim.step(TICK);
        panel.release(7, Direction::Down);
        assert_eq!(sim.shutters()[5].status(), ShutterStatus::MovingDown);

        panel.slot(5).up.press_at(TICK);
        sim.step(2 * TICK);
        assert_eq!(sim.shutters()[5].status(), ShutterStatus::Idle);
        assert_eq!(sim.shutters()[7].status(), ShutterStatus::MovingDown);
        assert_eq!(sim.stats().stops, 1);

        panel.release(5, Direction::Up);
        panel.release(5, Direction::Down);
        let parked = sim.shutters()[5].position();
        for i in 3..10 {
            sim.step(i * TICK);
        }
        assert_eq!(sim.shutters()[5].status(), ShutterStatus::Idle);
        assert_eq!(sim.shutters()[5].position(), parked);
        assert_eq!(sim.shutters()[7].status(), ShutterStatus::MovingDown);
    }

    #[test]
    fn progress_listener_receives_slot_and_position() {
        let (mut sim, panel, _exchange) = bank(0.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sim.set_progress_listener(Arc::new(move |slot: usize, pos: f64| {
            sink.lock().unwrap().push((slot, pos));
        }));

        panel.slot(9).down.press_at(0);
        sim.step(TICK);
        sim.step(2 * TICK);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(slot, _)| *slot == 9));
        assert!(seen[1].1 > seen[0].1);
    }

    #[test]
    fn publishes_snapshot_on_tick() {
        let (mut sim, panel, exchange) = bank(0.0);
        panel.slot(4).down.press_at(0);
        sim.step(TICK);
        let snapshot = exchange.read();
        assert_eq!(snapshot.tick_count, 1);
        assert_eq!(snapshot.timestamp_us, TICK);
        assert_eq!(snapshot.slot_count, 10);
        assert_eq!(snapshot.statuses()[4], ShutterStatus::MovingDown);
        assert!(snapshot.positions()[4] > 0.0);
    }

    #[test]
    fn finish_publishes_state_between_ticks() {
        let (mut sim, panel, exchange) = bank(0.0);
        panel.slot(6).down.press_at(0);
        sim.step(TICK);
        panel.release(6, Direction::Down);
        panel.slot(6).down.press_at(TICK + 100);

        assert!(!sim.step(TICK + 200));
        assert_eq!(sim.shutters()[6].status(), ShutterStatus::Idle);
        assert_eq!(exchange.read().statuses()[6], ShutterStatus::MovingDown);

        sim.finish(TICK + 300);
        let snapshot = exchange.read();
        assert_eq!(snapshot.statuses()[6], ShutterStatus::Idle);
        assert_eq!(snapshot.timestamp_us, TICK + 300);
        assert_eq!(snapshot.iterations, 2);
    }

    #[test]
    fn run_exits_on_stop_request() {
        let config = SimConfig::default();
        let panel = ControlPanel::new(config.shutter_count, TimeBase::new());
        let exchange = Arc::new(BankExchange::new());
        let loop_panel = panel.clone();
        let loop_exchange = Arc::clone(&exchange);

        let handle = thread::spawn(move || {
            let mut sim = SimulationLoop::new(config, loop_panel, loop_exchange);
            sim.run();
            sim.stats().clone()
        });

        panel.press(0, Direction::Down);
        thread::sleep(Duration::from_millis(100));
        panel.release(0, Direction::Down);
        panel.request_stop();

        let stats = handle.join().unwrap();
        assert!(stats.ticks > 0);
        assert!(exchange.read().positions()[0] > 0.0);
    }
}
