//! Terminal progress display.

use shutter_core::BankSnapshot;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::warn;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
const BAR_WIDTH: usize = 8;

/// Position update handed from the loop thread to the display.
pub type ProgressUpdate = (usize, f64);

/// Latest known position per slot, drawn as one bar per shutter.
#[derive(Debug)]
pub struct BarDisplay {
    positions: Vec<f64>,
    dirty: bool,
}

impl BarDisplay {
    pub fn new(slot_count: usize) -> Self {
        Self {
            positions: vec![0.0; slot_count],
            dirty: false,
        }
    }

    /// Out-of-range values are clamped; unknown slots are dropped.
    pub fn update(&mut self, slot: usize, position: f64) {
        let value = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
        if let Some(current) = self.positions.get_mut(slot) {
            *current = value;
            self.dirty = true;
        }
    }

    #[cfg(test)]
    fn position(&self, slot: usize) -> Option<f64> {
        self.positions.get(slot).copied()
    }

    /// One line, filled portion proportional to how far down each shutter is.
    pub fn render_line(&self) -> String {
        self.positions
            .iter()
            .enumerate()
            .map(|(slot, pos)| {
                let filled = (pos * BAR_WIDTH as f64).round() as usize;
                format!(
                    "{slot}[{}{}]",
                    "#".repeat(filled),
                    ".".repeat(BAR_WIDTH - filled)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn draw(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.dirty = false;
        writeln!(out, "{}", self.render_line())?;
        out.flush()
    }
}

/// Drains progress updates until every sender is gone, redrawing at most
/// every [`REDRAW_INTERVAL`]. With `quiet`, updates are consumed but never
/// drawn.
pub fn run_renderer(
    updates: Receiver<ProgressUpdate>,
    slot_count: usize,
    quiet: bool,
    mut out: impl Write,
) {
    let mut display = BarDisplay::new(slot_count);
    let mut last_draw = Instant::now();

    loop {
        match updates.recv_timeout(REDRAW_INTERVAL) {
            Ok((slot, position)) => {
                display.update(slot, position);
                while let Ok((slot, position)) = updates.try_recv() {
                    display.update(slot, position);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if !quiet && display.dirty && last_draw.elapsed() >= REDRAW_INTERVAL {
            if let Err(e) = display.draw(&mut out) {
                warn!(error = %e, "Failed to draw progress");
                return;
            }
            last_draw = Instant::now();
        }
    }

    if !quiet && display.dirty {
        if let Err(e) = display.draw(&mut out) {
            warn!(error = %e, "Failed to draw progress");
        }
    }
}

/// Final per-slot state: `slot <i> <status> <position>`.
pub fn write_summary(out: &mut impl Write, snapshot: &BankSnapshot) -> io::Result<()> {
    for (slot, (status, position)) in snapshot
        .statuses()
        .iter()
        .zip(snapshot.positions())
        .enumerate()
    {
        writeln!(out, "slot {slot} {status} {position:.3}")?;
    }
    out.flush()
}
