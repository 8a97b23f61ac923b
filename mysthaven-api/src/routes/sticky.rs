//! Sticky Message REST API Routes

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::{EntityType, HavenError, StickyMessage, StickyMessagePatch};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{Access, AppState},
};

/// GET /sticky/:channelId
pub async fn get_sticky(
    State(access): State<Access>,
    PathKey(channel_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let sticky = access
        .get::<StickyMessage>(&StickyMessage::by_channel(&channel_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::StickyMessage, channel_id))?;
    Ok(Json(sticky))
}

/// POST /sticky/:channelId
pub async fn upsert_sticky(
    State(access): State<Access>,
    PathKey(channel_id): PathKey,
    JsonBody(patch): JsonBody<StickyMessagePatch>,
) -> ApiResult<impl IntoResponse> {
    let sticky = access
        .upsert::<StickyMessage>(&StickyMessage::by_channel(&channel_id), patch.into_update()?)
        .await?;
    Ok(Json(json!({
        "message": "Sticky message updated successfully",
        "stickyMessage": sticky,
    })))
}

/// DELETE /sticky/:channelId
pub async fn delete_sticky(
    State(access): State<Access>,
    PathKey(channel_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    access
        .delete::<StickyMessage>(&StickyMessage::by_channel(&channel_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::StickyMessage, channel_id))?;
    Ok(Json(json!({ "message": "Sticky message deleted successfully" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/sticky/:channelId",
            get(get_sticky).post(upsert_sticky).delete(delete_sticky),
        )
        .with_state(state)
}
