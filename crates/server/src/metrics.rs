//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the tixcache server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Ticket downloads served
//! - Core metrics (cache lookups, generations, previews)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tixcache_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tixcache_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tixcache_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Ticket files served, by provider.
pub static TICKET_DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tixcache_ticket_downloads_total",
            "Ticket files served to clients",
        ),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Registration and Export
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Downloads
    registry
        .register(Box::new(TICKET_DOWNLOADS_TOTAL.clone()))
        .unwrap();

    // Core
    for metric in tixcache_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());
static TICKET_FILENAME: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/tickets/[^/]+$").unwrap());
static PREVIEW_PROVIDER: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/preview/[^/]+$").unwrap());

/// Normalize a request path into a low-cardinality metric label.
pub fn normalize_path(path: &str) -> String {
    // Applied twice: adjacent numeric segments share the separating slash.
    let result = NUMERIC_SEGMENT.replace_all(path, "/{id}$1");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    let result = TICKET_FILENAME.replace_all(&result, "/tickets/{filename}");
    let result = PREVIEW_PROVIDER.replace_all(&result, "/preview/{provider}");
    result.to_string()
}
