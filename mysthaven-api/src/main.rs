//! Mysthaven API Server Entry Point
//!
//! Bootstraps configuration and telemetry, opens the configured cache and
//! durable store, and starts the Axum HTTP server.

use mysthaven_api::telemetry::{init_tracer, TelemetryConfig};
use mysthaven_api::{build_state, create_api_router, ApiError, ApiResult, ServiceConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ServiceConfig::from_env()?;

    let telemetry_config = TelemetryConfig::default().with_log_format(config.log_format);
    init_tracer(&telemetry_config)?;

    tracing::info!(
        cache_backend = ?config.cache_backend,
        store_backend = ?config.store_backend,
        default_ttl_secs = config.cache.default_ttl.as_secs(),
        channel_ttl_secs = config.cache.channel_ttl.as_secs(),
        cooldown_window_secs = config.cache.cooldown_window.as_secs(),
        "Starting Mysthaven API"
    );

    let state = build_state(&config).await?;
    let app = create_api_router(state, &config);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "Mysthaven API listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
