//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket cache lookups (hits and misses)
//! - Ticket generation (results and duration)
//! - Ticket resolution failures
//! - Previews

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by entity kind and result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tixcache_cache_lookups_total",
            "Ticket cache lookups during resolution",
        ),
        &["kind", "result"], // result: "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Generation Metrics
// =============================================================================

/// Generations by provider and result.
pub static GENERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tixcache_generations_total", "Ticket generations"),
        &["provider", "result"], // result: "success", "no_output", "failed"
    )
    .unwrap()
});

/// Generation duration in seconds.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tixcache_generation_duration_seconds",
            "Duration of a single ticket generation",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Items skipped during resolution, by provider and error category.
pub static RESOLUTION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tixcache_resolution_failures_total",
            "Tickets skipped during resolution because generation failed",
        ),
        &["provider", "error"],
    )
    .unwrap()
});

// =============================================================================
// Preview Metrics
// =============================================================================

/// Previews by provider and result.
pub static PREVIEWS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tixcache_previews_total", "Ticket previews rendered"),
        &["provider", "result"], // result: "success", "no_output", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(GENERATIONS_TOTAL.clone()),
        Box::new(GENERATION_DURATION.clone()),
        Box::new(RESOLUTION_FAILURES.clone()),
        Box::new(PREVIEWS_TOTAL.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_in_fresh_registry() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        CACHE_LOOKUPS.with_label_values(&["order", "hit"]).inc();
        assert!(!registry.gather().is_empty());
    }
}
