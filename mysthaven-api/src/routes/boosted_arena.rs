//! Boosted Arena List REST API Routes
//!
//! One list per guild. A POST replaces the member set wholesale.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::{BoostedArenaList, BoostedArenaPatch, EntityType, HavenError};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{Access, AppState},
};

/// GET /boosted-arena/:guildId
pub async fn get_arena_list(
    State(access): State<Access>,
    PathKey(guild_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let list = access
        .get::<BoostedArenaList>(&BoostedArenaList::by_guild(&guild_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::BoostedArenaList, guild_id))?;
    Ok(Json(list))
}

/// POST /boosted-arena/:guildId
pub async fn upsert_arena_list(
    State(access): State<Access>,
    PathKey(guild_id): PathKey,
    JsonBody(patch): JsonBody<BoostedArenaPatch>,
) -> ApiResult<impl IntoResponse> {
    let list = access
        .upsert::<BoostedArenaList>(&BoostedArenaList::by_guild(&guild_id), patch.into_update()?)
        .await?;

    tracing::info!(guild_id = %list.guild_id, members = list.members.len(), "Boosted arena list updated");
    Ok(Json(json!({
        "message": "Boosted arena list updated successfully",
        "arenaList": list,
    })))
}

/// DELETE /boosted-arena/:guildId
pub async fn delete_arena_list(
    State(access): State<Access>,
    PathKey(guild_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    access
        .delete::<BoostedArenaList>(&BoostedArenaList::by_guild(&guild_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::BoostedArenaList, guild_id))?;
    Ok(Json(json!({ "message": "Boosted arena list deleted successfully" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/boosted-arena/:guildId",
            get(get_arena_list)
                .post(upsert_arena_list)
                .delete(delete_arena_list),
        )
        .with_state(state)
}
