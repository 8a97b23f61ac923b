//! Username Log REST API Routes
//!
//! `username -> userId` entries that live only in the cache.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mysthaven_core::{EntityType, HavenError, UsernameLogEntry};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{AppState, Usernames},
};

/// GET /ttLog/:username
pub async fn get_entry(
    State(usernames): State<Usernames>,
    PathKey(username): PathKey,
) -> ApiResult<impl IntoResponse> {
    let entry = usernames
        .get(&username)
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::UsernameLogEntry, username))?;
    Ok(Json(entry))
}

/// POST /ttLog
pub async fn set_entry(
    State(usernames): State<Usernames>,
    JsonBody(entry): JsonBody<UsernameLogEntry>,
) -> ApiResult<impl IntoResponse> {
    usernames.set(&entry).await?;
    Ok(Json(json!({
        "message": "ttLog entry set",
        "username": entry.username,
        "userId": entry.user_id,
    })))
}

/// DELETE /ttLog/:username
pub async fn delete_entry(
    State(usernames): State<Usernames>,
    PathKey(username): PathKey,
) -> ApiResult<impl IntoResponse> {
    if !usernames.delete(&username).await? {
        return Err(HavenError::not_found(EntityType::UsernameLogEntry, username).into());
    }
    Ok(Json(json!({ "message": "ttLog entry deleted", "username": username })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ttLog", post(set_entry))
        .route("/ttLog/:username", get(get_entry).delete(delete_entry))
        .with_state(state)
}
