//! Progression User REST API Routes
//!
//! Rank and experience per user, keyed by the user's snowflake id.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use mysthaven_core::{EntityType, HavenError, ProgressionUser, ProgressionUserPatch};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{Access, AppState},
};

/// GET /rxuser/:id
pub async fn get_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let user = access
        .get::<ProgressionUser>(&ProgressionUser::by_user(&user_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::ProgressionUser, user_id))?;
    Ok(Json(user))
}

/// POST /rxuser/:id - Partial upsert; absent fields keep their stored value.
pub async fn upsert_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
    JsonBody(patch): JsonBody<ProgressionUserPatch>,
) -> ApiResult<impl IntoResponse> {
    let update = patch.into_update(access.now())?;
    let user = access
        .upsert::<ProgressionUser>(&ProgressionUser::by_user(&user_id), update)
        .await?;

    tracing::info!(user_id = %user.user_id, "Progression user updated");
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

/// DELETE /rxuser/:id
pub async fn delete_user(
    State(access): State<Access>,
    PathKey(user_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    access
        .delete::<ProgressionUser>(&ProgressionUser::by_user(&user_id))
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::ProgressionUser, &user_id))?;

    tracing::info!(user_id = %user_id, "Progression user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/rxuser/:id",
            get(get_user).post(upsert_user).delete(delete_user),
        )
        .with_state(state)
}
