//! Prometheus metrics for stubsmith.
//!
//! Tracks request outcomes, match-cache effectiveness, reloads and callbacks.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of stub requests resolved
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "stubsmith_requests_total",
        "Total number of requests resolved by the stub server",
        &["outcome"]  // outcome: matched|unauthorized|redirect|record|not_found
    )
    .unwrap();

    /// Match cache lookups
    pub static ref MATCH_CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "stubsmith_match_cache_lookups_total",
        "Total number of match cache lookups",
        &["result"]  // result: hit|miss
    )
    .unwrap();

    /// Store reloads
    pub static ref RELOADS_TOTAL: CounterVec = register_counter_vec!(
        "stubsmith_reloads_total",
        "Total number of configuration reload attempts",
        &["source", "result"]  // source: config|external|admin, result: success|error
    )
    .unwrap();

    /// Callback deliveries
    pub static ref CALLBACKS_TOTAL: CounterVec = register_counter_vec!(
        "stubsmith_callbacks_total",
        "Total number of outbound callbacks attempted",
        &["result"]  // result: success|error
    )
    .unwrap();

    /// Stubs in the current snapshot
    pub static ref STUBS_LOADED: Gauge = register_gauge!(
        "stubsmith_stubs_loaded",
        "Number of stubs in the current configuration snapshot"
    )
    .unwrap();

    /// Resolution duration
    pub static ref RESOLVE_DURATION_MS: HistogramVec = register_histogram_vec!(
        "stubsmith_resolve_duration_ms",
        "Time to resolve a request, including configured latency",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record a resolved request
pub fn record_request(outcome: &str, duration_ms: f64) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    RESOLVE_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

/// Helper to record a reload attempt
pub fn record_reload(source: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    RELOADS_TOTAL.with_label_values(&[source, result]).inc();
}

/// Helper to record a callback delivery
pub fn record_callback(success: bool) {
    let result = if success { "success" } else { "error" };
    CALLBACKS_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_stubs_loaded(count: usize) {
    STUBS_LOADED.set(count as f64);
}
