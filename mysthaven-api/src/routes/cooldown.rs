//! Channel Cooldown REST API Routes

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::{CooldownTrack, HavenError, ValidationError};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{JsonBody, PathKey},
    state::{AppState, Cooldowns},
};

/// Body of POST and DELETE: which track to act on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackRequest {
    #[serde(rename = "type", default)]
    pub track: Option<String>,
}

impl TrackRequest {
    pub fn track(&self) -> ApiResult<CooldownTrack> {
        let raw = self
            .track
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::missing_field("type"))?;
        raw.parse::<CooldownTrack>().map_err(|e| {
            let invalid =
                ValidationError::invalid("type", format!("{}; expected \"emoji\" or \"name\"", e));
            ApiError::from(HavenError::from(invalid))
        })
    }
}

/// GET /cooldown/:channelId - Both tracks, recomputed against the clock.
pub async fn get_cooldown(
    State(cooldowns): State<Cooldowns>,
    PathKey(channel_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(cooldowns.status(&channel_id).await?))
}

/// POST /cooldown/:channelId - Start one track for the configured window.
pub async fn set_cooldown(
    State(cooldowns): State<Cooldowns>,
    PathKey(channel_id): PathKey,
    JsonBody(request): JsonBody<TrackRequest>,
) -> ApiResult<impl IntoResponse> {
    let track = request.track()?;
    let set = cooldowns.set(&channel_id, track).await?;
    Ok(Json(json!({
        "message": format!("{} cooldown set successfully", track),
        "expiresAt": set.expires_at,
        "status": set.status,
    })))
}

/// DELETE /cooldown/:channelId - Clear one track.
pub async fn clear_cooldown(
    State(cooldowns): State<Cooldowns>,
    PathKey(channel_id): PathKey,
    JsonBody(request): JsonBody<TrackRequest>,
) -> ApiResult<impl IntoResponse> {
    let track = request.track()?;
    let status = cooldowns.clear(&channel_id, track).await?;
    Ok(Json(json!({
        "message": format!("{} cooldown removed successfully", track),
        "status": status,
    })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/cooldown/:channelId",
            get(get_cooldown).post(set_cooldown).delete(clear_cooldown),
        )
        .with_state(state)
}
