// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Remote calls --------
pub static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gam_api_requests_total", "Ad Manager calls (labels: surface=rest|soap, outcome)"),
        &["surface", "outcome"],
    )
    .expect("valid metric opts")
});

pub static API_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("gam_api_latency_ms", "Ad Manager call latency (ms)")
            .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]),
    )
    .expect("valid metric opts")
});

// -------- Forecast resolution --------
pub static FORECAST_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gam_forecast_attempts_total", "inventory source attempts (labels: source, outcome)"),
        &["source", "outcome"],
    )
    .expect("valid metric opts")
});

pub static REPORT_ROWS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("gam_report_rows_total", "report rows pulled").expect("valid metric opts"));

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(API_REQUESTS.clone())),
        REGISTRY.register(Box::new(API_LATENCY_MS.clone())),
        REGISTRY.register(Box::new(FORECAST_ATTEMPTS.clone())),
        REGISTRY.register(Box::new(REPORT_ROWS.clone())),
    ] {
        if let Err(e) = m {
            tracing::debug!(?e, "metric already registered");
        }
    }
}

/// Prometheus text exposition of everything recorded in this invocation.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
