//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/ready - Cache and durable store connectivity check
//! - /health/live - Process alive check

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::HavenResult;
use serde::{Deserialize, Serialize};

use crate::state::{Access, AppState};

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub cache: ComponentHealth,
    pub store: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_probe(result: HavenResult<()>, started: Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => Self {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check. Unhealthy if either adapter fails
/// its ping.
pub async fn readiness(
    State(access): State<Access>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let started = Instant::now();
    let cache = ComponentHealth::from_probe(access.cache().ping().await, started);

    let started = Instant::now();
    let store = ComponentHealth::from_probe(access.store().ping().await, started);

    let overall_status =
        if cache.status == HealthStatus::Healthy && store.status == HealthStatus::Healthy {
            HealthStatus::Healthy
        } else {
            tracing::warn!(cache = ?cache.error, store = ?store.error, "Readiness check failed");
            HealthStatus::Unhealthy
        };

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            cache,
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router, mounted under `/health`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}
