//! Prometheus metrics for the cexscan client.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error surfaced on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// HTTP attempts by endpoint and outcome.
/// Labels: outcome (ok/server_error/client_error/timeout/transport)
pub static HTTP_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_http_attempts_total",
        "Total HTTP attempts by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// Attempt latency in milliseconds.
pub static HTTP_ATTEMPT_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cexscan_http_attempt_duration_ms",
        "HTTP attempt latency in milliseconds",
        &["endpoint"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0]
    )
    .unwrap()
});

/// Cooldowns registered after exhausted retries.
pub static ENDPOINT_COOLDOWNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_endpoint_cooldowns_total",
        "Total endpoint cooldowns registered",
        &["endpoint"]
    )
    .unwrap()
});

/// Calls short-circuited by an active cooldown.
pub static ENDPOINT_SHORT_CIRCUITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_endpoint_short_circuits_total",
        "Calls rejected without a network attempt because the endpoint is cooling down",
        &["endpoint"]
    )
    .unwrap()
});

/// License checks by outcome.
/// Labels: outcome (ok/failed/malformed/skipped)
pub static LICENSE_CHECKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_license_checks_total",
        "Total license checks by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Pairs visible after filtering.
pub static VISIBLE_PAIRS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("cexscan_visible_pairs", "Pairs visible after filtering").unwrap()
});

/// Frames rendered by view.
pub static RENDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_renders_total",
        "Total frames rendered by view",
        &["view"]
    )
    .unwrap()
});

/// Settings writes by outcome.
/// Labels: outcome (persisted/local_only/rejected)
pub static SETTINGS_WRITES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cexscan_settings_writes_total",
        "Total settings writes by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record one HTTP attempt.
    pub fn http_attempt(endpoint: &str, outcome: &str, duration_ms: f64) {
        HTTP_ATTEMPTS_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
        HTTP_ATTEMPT_DURATION_MS
            .with_label_values(&[endpoint])
            .observe(duration_ms);
    }

    pub fn endpoint_cooldown(endpoint: &str) {
        ENDPOINT_COOLDOWNS_TOTAL.with_label_values(&[endpoint]).inc();
    }

    pub fn endpoint_short_circuit(endpoint: &str) {
        ENDPOINT_SHORT_CIRCUITS_TOTAL
            .with_label_values(&[endpoint])
            .inc();
    }

    pub fn license_check(outcome: &str) {
        LICENSE_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn visible_pairs(count: usize) {
        VISIBLE_PAIRS.set(count as i64);
    }

    pub fn render(view: &str) {
        RENDERS_TOTAL.with_label_values(&[view]).inc();
    }

    pub fn settings_write(outcome: &str) {
        SETTINGS_WRITES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Text exposition of every registered metric.
    pub fn render_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
