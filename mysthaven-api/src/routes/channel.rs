//! Channel REST API Routes
//!
//! A channel record binds one user to one personal channel and can be looked
//! up from either side. Reads and deletes take exactly one of `userId` or
//! `channelId` as a query parameter; `userId` wins when both are given.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use mysthaven_core::{Channel, ChannelBinding, EntityType, HavenError, Lookup};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    extractors::JsonBody,
    state::{Access, AppState},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelQuery {
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
}

impl ChannelQuery {
    /// The lookup this query selects. Blank values count as absent.
    pub fn lookup(&self) -> ApiResult<Lookup> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(user_id) = present(&self.user_id) {
            return Ok(Channel::by_user(user_id));
        }
        if let Some(channel_id) = present(&self.channel_id) {
            return Ok(Channel::by_channel(channel_id));
        }
        Err(ApiError::invalid_input("Provide either userId or channelId"))
    }
}

/// GET /channel?userId=... | ?channelId=...
pub async fn get_channel(
    State(access): State<Access>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult<impl IntoResponse> {
    let lookup = query.lookup()?;
    let channel = access
        .get::<Channel>(&lookup)
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::Channel, lookup.to_string()))?;
    Ok(Json(channel))
}

/// POST /channel - Bind a user to a channel, moving them if already bound.
pub async fn upsert_channel(
    State(access): State<Access>,
    JsonBody(binding): JsonBody<ChannelBinding>,
) -> ApiResult<impl IntoResponse> {
    let lookup = Channel::by_user(binding.user_id.clone());
    let update = binding.into_update(access.now())?;
    let channel = access.upsert::<Channel>(&lookup, update).await?;

    tracing::info!(user_id = %channel.user_id, channel_id = %channel.channel_id, "Channel bound");
    Ok(Json(json!({ "message": "Channel updated successfully", "channel": channel })))
}

/// DELETE /channel?userId=... | ?channelId=...
pub async fn delete_channel(
    State(access): State<Access>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult<impl IntoResponse> {
    let lookup = query.lookup()?;
    let channel = access
        .delete::<Channel>(&lookup)
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::Channel, lookup.to_string()))?;

    tracing::info!(user_id = %channel.user_id, channel_id = %channel.channel_id, "Channel deleted");
    Ok(Json(json!({ "message": "Channel deleted successfully" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/channel",
            get(get_channel).post(upsert_channel).delete(delete_channel),
        )
        .with_state(state)
}
