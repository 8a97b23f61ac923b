//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either
//! JSON or human-readable output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "mysthaven_api=debug,mysthaven_storage=debug,tower_http=info,info";

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "mysthaven-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn with_log_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }
}

/// `RUST_LOG` when set and valid, otherwise the service default.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the tracing subscriber.
///
/// Should be called once at application startup before any tracing occurs.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}
