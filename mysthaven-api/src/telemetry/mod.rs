//! Mysthaven Telemetry - Observability Infrastructure
//!
//! Structured logging via `tracing-subscriber` and Prometheus metrics for the
//! HTTP layer and the cache-aside lookups beneath it.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, MetricsObserver, MysthavenMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, TelemetryConfig};
