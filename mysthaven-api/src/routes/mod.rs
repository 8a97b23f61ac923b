//! REST API Routes Module
//!
//! One module per record family, each exposing `create_router`. Paths are the
//! bot's existing ones (`/rxuser/:id`, `/channel?userId=`, ...), unversioned.

pub mod boosted_arena;
pub mod channel;
pub mod cooldown;
pub mod giveaway;
pub mod health;
pub mod mtuser;
pub mod rxuser;
pub mod sticky;
pub mod ttlog;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, Uri},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use boosted_arena::create_router as boosted_arena_router;
pub use channel::create_router as channel_router;
pub use cooldown::create_router as cooldown_router;
pub use giveaway::create_router as giveaway_router;
pub use health::create_router as health_router;
pub use mtuser::create_router as mtuser_router;
pub use rxuser::create_router as rxuser_router;
pub use sticky::create_router as sticky_router;
pub use ttlog::create_router as ttlog_router;

const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

fn build_cors_layer(config: &ServiceConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(CORS_MAX_AGE);

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::new(
        ErrorCode::EntityNotFound,
        format!("No route for {}", uri.path()),
    )
}

/// Create the complete service router.
pub fn create_api_router(state: AppState, config: &ServiceConfig) -> Router {
    Router::new()
        .merge(rxuser::create_router(state.clone()))
        .merge(mtuser::create_router(state.clone()))
        .merge(channel::create_router(state.clone()))
        .merge(sticky::create_router(state.clone()))
        .merge(boosted_arena::create_router(state.clone()))
        .merge(cooldown::create_router(state.clone()))
        .merge(ttlog::create_router(state.clone()))
        .merge(giveaway::create_router(state.clone()))
        .nest("/health", health::create_router(state))
        .route("/metrics", get(metrics_handler))
        .fallback(route_not_found)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let config = ServiceConfig {
            cors_origins: vec!["https://mysthaven.gg".into(), "not a header\n".into()],
            ..ServiceConfig::default()
        };
        // Invalid origins are skipped rather than failing startup.
        let _ = build_cors_layer(&config);
        let _ = build_cors_layer(&ServiceConfig::default());
    }
}
