//! Metrics module for redemption-service.
//! Provides Prometheus metrics for the redemption hot path and HTTP surface.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Queries slower than this are surfaced to the log as warnings.
const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "redemption_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// HTTP request counter.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "redemption_http_requests_total",
            "Total HTTP requests by method, path and status"
        ),
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL")
});

/// HTTP request duration histogram.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "redemption_http_request_duration_seconds",
            "HTTP request duration by method and path"
        ),
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION")
});

/// Redemption attempts by outcome.
pub static REDEMPTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Codes loaded through the ingest path.
pub static CODES_INGESTED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    REDEMPTIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "redemption_redemptions_total",
                "Total redemption attempts by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register REDEMPTIONS_TOTAL")
    });

    CODES_INGESTED_TOTAL.get_or_init(|| {
        register_int_counter!(opts!(
            "redemption_codes_ingested_total",
            "Total codes loaded through the ingest path"
        ))
        .expect("Failed to register CODES_INGESTED_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
    let _ = &*HTTP_REQUESTS_TOTAL;
    let _ = &*HTTP_REQUEST_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record one database query: histogram sample plus a slow-query warning.
pub fn observe_db_query(operation: &str, elapsed: Duration) {
    DB_QUERY_DURATION
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());

    if elapsed > SLOW_QUERY_THRESHOLD {
        warn!(
            operation,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow database query"
        );
    }
}

/// Record a redemption attempt outcome.
pub fn record_redemption(outcome: &str) {
    if let Some(counter) = REDEMPTIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record codes loaded by an upload.
pub fn record_codes_ingested(count: u64) {
    if let Some(counter) = CODES_INGESTED_TOTAL.get() {
        counter.inc_by(count);
    }
}
