use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::presentation::console::run_console;
use crate::presentation::render::{run_renderer, write_summary, ProgressUpdate};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::error::RuntimeError;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use shutter_core::{
    tags, BankExchange, BankSnapshot, ControlPanel, ExecutionStats, SimConfig, SimulationLoop,
    TimeBase,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const STOP_POLL: Duration = Duration::from_millis(20);

pub fn run_from_args() -> ExitCode {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Simulator failed");
            eprintln!("shutter-sim: {e}");
            ExitCode::FAILURE
        }
    }
}

pub fn run(config: RuntimeConfig) -> Result<(), RuntimeError> {
    let _log_guard = init_tracing(config.json_logs, config.log_file.as_deref()).map_err(
        |source| RuntimeError::LogFile {
            path: config.log_file.clone().unwrap_or_default(),
            source,
        },
    )?;

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let sim_config = SimConfig::default();
    let timebase = TimeBase::new();
    let panel = ControlPanel::new(sim_config.shutter_count, timebase);
    let exchange = Arc::new(BankExchange::new());

    let audit_logger = config
        .audit_path
        .as_deref()
        .map(init_audit_logger)
        .transpose()?;

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "shutters": sim_config.shutter_count,
            }),
        );
    }

    info!(
        shutters = sim_config.shutter_count,
        tick_ms = sim_config.tick_interval.as_millis() as u64,
        long_press_ms = sim_config.long_press_threshold.as_millis() as u64,
        speed_per_tick = sim_config.speed_per_tick,
        "Starting shutter simulation"
    );

    let (progress_tx, progress_rx) = mpsc::channel::<ProgressUpdate>();
    let slot_count = sim_config.shutter_count;
    let quiet = config.quiet;
    let render_handle = thread::spawn(move || {
        run_renderer(progress_rx, slot_count, quiet, std::io::stdout());
    });

    let loop_panel = panel.clone();
    let loop_exchange = Arc::clone(&exchange);
    let loop_handle = thread::spawn(move || {
        let mut sim = SimulationLoop::new(sim_config, loop_panel, loop_exchange);
        // Enqueue and return: rendering happens on the display thread.
        sim.set_progress_listener(Arc::new(move |slot: usize, position: f64| {
            let _ = progress_tx.send((slot, position));
        }));
        sim.run();
        sim.stats().clone()
    });

    let metrics_handle = config
        .metrics_addr
        .as_ref()
        .map(|_| telemetry::start_metrics_updater(Arc::clone(&exchange), panel.clone()));

    // Stdin reads cannot be interrupted, so this thread is never joined.
    let console_panel = panel.clone();
    let console_audit = audit_logger.clone();
    let stop_on_eof = config.run_seconds.is_none();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        run_console(&console_panel, stdin.lock(), console_audit, stop_on_eof);
    });

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        let deadline = Instant::now() + Duration::from_secs(seconds);
        while Instant::now() < deadline && !panel.stop_requested() {
            thread::sleep(STOP_POLL);
        }
        panel.request_stop();
    }

    let stats = loop_handle.join().map_err(|_| RuntimeError::LoopPanicked)?;
    if render_handle.join().is_err() {
        warn!("Progress display thread panicked");
    }
    if let Some(handle) = metrics_handle {
        let _ = handle.join();
    }

    info!(
        iterations = stats.iterations,
        ticks = stats.ticks,
        commands_applied = stats.commands_applied,
        broadcasts = stats.broadcasts,
        stops = stats.stops,
        "Run complete"
    );

    let snapshot = exchange.read();
    write_summary(&mut std::io::stdout().lock(), &snapshot)?;

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemShutdown,
            shutdown_details(&stats, &snapshot),
        );
    }

    Ok(())
}

fn init_audit_logger(path: &Path) -> Result<Arc<AuditLogger>, RuntimeError> {
    match AuditLogger::new(path) {
        Ok(logger) => {
            info!(path = %path.display(), "Audit logging enabled");
            Ok(Arc::new(logger))
        }
        Err(source) => Err(RuntimeError::Audit {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Audit details for the shutdown event, keyed by the shared tag names.
fn shutdown_details(stats: &ExecutionStats, snapshot: &BankSnapshot) -> serde_json::Value {
    serde_json::json!({
        (tags::TICKS.key): stats.ticks,
        (tags::LOOP_ITERATIONS.key): stats.iterations,
        (tags::BROADCASTS.key): stats.broadcasts,
        (tags::STOPS.key): stats.stops,
        (tags::SHUTTERS_MOVING.key): snapshot.moving_count(),
        (tags::SHUTTER_POSITION.key): snapshot.positions(),
    })
}
