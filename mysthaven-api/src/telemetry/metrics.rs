//! Prometheus Metrics Definitions
//!
//! Defines all Mysthaven metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use mysthaven_core::EntityType;
use mysthaven_storage::{LookupObserver, LookupOutcome};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<MysthavenMetrics>> = Lazy::new(MysthavenMetrics::new);

/// Container for all Mysthaven metrics.
#[derive(Clone)]
pub struct MysthavenMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Keyed lookups by where they were answered - labels: entity, outcome
    pub cache_lookups_total: CounterVec,
}

impl MysthavenMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "mysthaven_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "mysthaven_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "mysthaven_cache_lookups_total",
                "Keyed lookups by entity and outcome (hit, miss, store_miss)",
                &["entity", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record where a keyed lookup was answered.
    pub fn record_lookup(&self, entity_type: EntityType, outcome: LookupOutcome) {
        self.cache_lookups_total
            .with_label_values(&[entity_type.label(), outcome.as_str()])
            .inc();
    }
}

/// Feeds access-layer lookup outcomes into [`METRICS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl LookupObserver for MetricsObserver {
    fn observe(&self, entity_type: EntityType, outcome: LookupOutcome) {
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_lookup(entity_type, outcome);
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        // Force initialization
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_http_request("GET", "/rxuser/:id", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_observer_counts_lookups() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let counter = metrics
            .cache_lookups_total
            .with_label_values(&[EntityType::StickyMessage.label(), "hit"]);
        let before = counter.get();

        MetricsObserver.observe(EntityType::StickyMessage, LookupOutcome::Hit);
        assert!(counter.get() >= before + 1.0);
        Ok(())
    }
}
