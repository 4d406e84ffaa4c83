//! Line-oriented control input.
//!
//! Stands in for the buttons of a graphical front end: each line presses or
//! releases one control on the shared [`ControlPanel`].

use crate::infra::audit::{AuditEventType, AuditLogger};
use shutter_core::{ControlPanel, Direction};
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long `tap` holds a control. Spans a few ticks so the busy-polling
/// loop is certain to observe the press.
const TAP_HOLD: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(usize, Direction),
    Release(usize, Direction),
    Tap(usize, Direction),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownVerb(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid slot `{0}`")]
    InvalidSlot(String),
    #[error("slot {slot} out of range (bank has {count} shutters)")]
    SlotOutOfRange { slot: usize, count: usize },
    #[error("invalid direction `{0}`, expected up or down")]
    InvalidDirection(String),
    #[error("unexpected trailing input `{0}`")]
    Trailing(String),
}

impl ConsoleCommand {
    /// Parses one input line against a bank of `slot_count` shutters.
    pub fn parse(line: &str, slot_count: usize) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "stop" => ConsoleCommand::Quit,
            "press" | "p" => {
                let (slot, dir) = parse_target(&mut words, slot_count)?;
                ConsoleCommand::Press(slot, dir)
            }
            "release" | "r" => {
                let (slot, dir) = parse_target(&mut words, slot_count)?;
                ConsoleCommand::Release(slot, dir)
            }
            "tap" | "t" => {
                let (slot, dir) = parse_target(&mut words, slot_count)?;
                ConsoleCommand::Tap(slot, dir)
            }
            _ => return Err(CommandError::UnknownVerb(verb.to_string())),
        };

        match words.next() {
            Some(extra) => Err(CommandError::Trailing(extra.to_string())),
            None => Ok(command),
        }
    }
}

fn parse_target<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    slot_count: usize,
) -> Result<(usize, Direction), CommandError> {
    let slot_word = words.next().ok_or(CommandError::Missing("slot"))?;
    let slot = usize::from_str(slot_word)
        .map_err(|_| CommandError::InvalidSlot(slot_word.to_string()))?;
    if slot >= slot_count {
        return Err(CommandError::SlotOutOfRange {
            slot,
            count: slot_count,
        });
    }

    let dir_word = words.next().ok_or(CommandError::Missing("direction"))?;
    let direction = match dir_word.to_ascii_lowercase().as_str() {
        "up" | "u" => Direction::Up,
        "down" | "d" => Direction::Down,
        _ => return Err(CommandError::InvalidDirection(dir_word.to_string())),
    };
    Ok((slot, direction))
}

/// Feeds commands from `input` into `panel` until `quit` or end of input.
///
/// Raises the panel's stop flag on `quit`, and on end of input when
/// `stop_on_eof` is set.
pub fn run_console(
    panel: &ControlPanel,
    input: impl BufRead,
    audit: Option<Arc<AuditLogger>>,
    stop_on_eof: bool,
) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                break;
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        match ConsoleCommand::parse(&line, panel.slot_count()) {
            Ok(ConsoleCommand::Quit) => {
                info!("Stop requested from console");
                panel.request_stop();
                return;
            }
            Ok(command) => execute(panel, command, audit.as_deref()),
            Err(e) => warn!(error = %e, line = %line, "Ignoring console command"),
        }
    }

    if stop_on_eof {
        info!("Console input closed, stopping");
        panel.request_stop();
    } else {
        debug!("Console input closed");
    }
}

fn execute(panel: &ControlPanel, command: ConsoleCommand, audit: Option<&AuditLogger>) {
    match command {
        ConsoleCommand::Press(slot, direction) => press(panel, slot, direction, audit),
        ConsoleCommand::Release(slot, direction) => release(panel, slot, direction, audit),
        ConsoleCommand::Tap(slot, direction) => {
            press(panel, slot, direction, audit);
            thread::sleep(TAP_HOLD);
            release(panel, slot, direction, audit);
        }
        ConsoleCommand::Quit => panel.request_stop(),
    }
}

fn press(panel: &ControlPanel, slot: usize, direction: Direction, audit: Option<&AuditLogger>) {
    panel.press(slot, direction);
    let press_id = panel.slot(slot).tracker(direction).press_id();
    debug!(slot, %direction, press_id, "Control pressed");
    record(panel, audit, AuditEventType::ControlPressed, slot, direction, press_id);
}

fn release(panel: &ControlPanel, slot: usize, direction: Direction, audit: Option<&AuditLogger>) {
    let tracker = panel.slot(slot).tracker(direction);
    let held_ms = tracker.hold_duration().as_millis() as u64;
    panel.release(slot, direction);
    let press_id = tracker.press_id();
    debug!(slot, %direction, press_id, held_ms, "Control released");
    record(panel, audit, AuditEventType::ControlReleased, slot, direction, press_id);
}

fn record(
    panel: &ControlPanel,
    audit: Option<&AuditLogger>,
    event_type: AuditEventType,
    slot: usize,
    direction: Direction,
    press_id: u64,
) {
    if let Some(logger) = audit {
        let timebase = panel.timebase();
        if let Err(e) = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            event_type,
            serde_json::json!({
                "slot": slot,
                "direction": direction,
                "press_id": press_id,
            }),
        ) {
            warn!(error = %e, "Failed to write audit entry");
        }
    }
}
