//! Message Tally User REST API Routes

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::{EntityType, HavenError, MessageTallyPatch, MessageTallyUser};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{Access, AppState},
};

/// GET /mtuser/:id
pub async fn get_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let user = access
        .get::<MessageTallyUser>(&MessageTallyUser::by_user(&user_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::MessageTallyUser, user_id))?;
    Ok(Json(user))
}

/// POST /mtuser/:id
pub async fn upsert_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
    JsonBody(patch): JsonBody<MessageTallyPatch>,
) -> ApiResult<impl IntoResponse> {
    let update = patch.into_update(access.now())?;
    let user = access
        .upsert::<MessageTallyUser>(&MessageTallyUser::by_user(&user_id), update)
        .await?;
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

/// DELETE /mtuser/:id
pub async fn delete_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    access
        .delete::<MessageTallyUser>(&MessageTallyUser::by_user(&user_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::MessageTallyUser, user_id))?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/mtuser/:id",
            get(get_user).post(upsert_user).delete(delete_user),
        )
        .with_state(state)
}
