//! Prometheus metrics for the shutter bank.
//!
//! Values are sampled from the loop's published snapshots by a low-rate
//! updater thread; the simulation loop itself never touches the registry.

use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use shutter_core::{tags, BankExchange, BankSnapshot, ControlPanel};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;
use tiny_http::{Response, Server};
use tracing::info;

const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Loop Metrics
// ============================================================================

pub static TICKS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(tags::TICKS.metric, tags::TICKS.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static LOOP_ITERATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter =
        IntCounter::new(tags::LOOP_ITERATIONS.metric, tags::LOOP_ITERATIONS.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static BROADCASTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(tags::BROADCASTS.metric, tags::BROADCASTS.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static STOPS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(tags::STOPS.metric, tags::STOPS.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Bank State Metrics
// ============================================================================

pub static SHUTTERS_MOVING: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::SHUTTERS_MOVING.metric, tags::SHUTTERS_MOVING.help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static SHUTTER_POSITION: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauges = GaugeVec::new(
        Opts::new(tags::SHUTTER_POSITION.metric, tags::SHUTTER_POSITION.help),
        &["slot"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauges.clone())).unwrap();
    gauges
});

/// Initialize all metrics (forces lazy initialization)
pub fn init() {
    let _ = TICKS.get();
    let _ = LOOP_ITERATIONS.get();
    let _ = BROADCASTS.get();
    let _ = STOPS.get();
    let _ = SHUTTERS_MOVING.get();
    let _ = SHUTTER_POSITION.with_label_values(&["0"]).get();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Start the metrics HTTP server on the given address.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let _ = match render_metrics() {
                        Ok(buffer) => {
                            let response = Response::from_data(buffer);
                            match tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/plain; version=0.0.4"[..],
                            ) {
                                Ok(header) => request.respond(response.with_header(header)),
                                Err(()) => request.respond(response),
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to encode metrics: {}", e);
                            request.respond(
                                Response::from_string("Internal Server Error")
                                    .with_status_code(500),
                            )
                        }
                    };
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the loop has ticked
                    if TICKS.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

fn render_metrics() -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Running totals already pushed into the counters.
#[derive(Debug, Default)]
struct Published {
    ticks: u64,
    iterations: u64,
    broadcasts: u64,
    stops: u64,
}

impl Published {
    fn apply(&mut self, snapshot: &BankSnapshot) {
        advance(&TICKS, &mut self.ticks, snapshot.tick_count);
        advance(&LOOP_ITERATIONS, &mut self.iterations, snapshot.iterations);
        advance(&BROADCASTS, &mut self.broadcasts, snapshot.broadcasts);
        advance(&STOPS, &mut self.stops, snapshot.stops);

        SHUTTERS_MOVING.set(snapshot.moving_count() as f64);
        for (slot, position) in snapshot.positions().iter().enumerate() {
            SHUTTER_POSITION
                .with_label_values(&[slot.to_string().as_str()])
                .set(*position);
        }
    }
}

fn advance(counter: &IntCounter, last: &mut u64, current: u64) {
    if current > *last {
        counter.inc_by(current - *last);
        *last = current;
    }
}

pub fn start_metrics_updater(
    exchange: Arc<BankExchange>,
    panel: ControlPanel,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut published = Published::default();
        while !panel.stop_requested() {
            published.apply(&exchange.read());
            thread::sleep(UPDATE_INTERVAL);
        }
        published.apply(&exchange.read());
    })
}
