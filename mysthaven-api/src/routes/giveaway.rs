//! Giveaway REST API Routes
//!
//! Lifecycle: create (active) -> join/leave -> end (draws a winner) ->
//! reroll (draws again among the rest). Ended is terminal.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mysthaven_core::{EntityType, HavenError, Membership, NewGiveaway};
use serde_json::json;

use crate::{
    error::ApiResult,
    extractors::{JsonBody, PathKey},
    state::{AppState, Giveaways},
};

/// GET /giveaways - Giveaways still accepting entrants.
pub async fn list_active(State(giveaways): State<Giveaways>) -> ApiResult<impl IntoResponse> {
    Ok(Json(giveaways.list_active().await?))
}

/// POST /giveaway
pub async fn create_giveaway(
    State(giveaways): State<Giveaways>,
    JsonBody(request): JsonBody<NewGiveaway>,
) -> ApiResult<impl IntoResponse> {
    let giveaway = giveaways.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Giveaway created successfully", "giveaway": giveaway })),
    ))
}

/// GET /giveaway/:id
pub async fn get_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let giveaway = giveaways
        .get(&giveaway_id)
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::Giveaway, giveaway_id))?;
    Ok(Json(giveaway))
}

/// DELETE /giveaway/:id
pub async fn delete_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    giveaways
        .delete(&giveaway_id)
        .await?
        .ok_or_else(|| HavenError::not_found(EntityType::Giveaway, giveaway_id))?;
    Ok(Json(json!({ "message": "Giveaway deleted successfully" })))
}

/// POST /giveaway/:id/join
pub async fn join_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
    JsonBody(membership): JsonBody<Membership>,
) -> ApiResult<impl IntoResponse> {
    membership.validate().map_err(HavenError::from)?;
    let giveaway = giveaways.join(&giveaway_id, &membership.user_id).await?;
    Ok(Json(json!({
        "message": "Joined giveaway successfully",
        "participants": giveaway.participants.len(),
    })))
}

/// POST /giveaway/:id/leave
pub async fn leave_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
    JsonBody(membership): JsonBody<Membership>,
) -> ApiResult<impl IntoResponse> {
    membership.validate().map_err(HavenError::from)?;
    let giveaway = giveaways.leave(&giveaway_id, &membership.user_id).await?;
    Ok(Json(json!({
        "message": "Left giveaway successfully",
        "participants": giveaway.participants.len(),
    })))
}

/// POST /giveaway/:id/end
pub async fn end_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let giveaway = giveaways.end(&giveaway_id).await?;
    let message = match giveaway.winner {
        Some(_) => "Giveaway ended",
        None => "Giveaway ended with no participants",
    };
    Ok(Json(json!({ "message": message, "winner": giveaway.winner })))
}

/// POST /giveaway/:id/reroll
pub async fn reroll_giveaway(
    State(giveaways): State<Giveaways>,
    PathKey(giveaway_id): PathKey,
) -> ApiResult<impl IntoResponse> {
    let giveaway = giveaways.reroll(&giveaway_id).await?;
    Ok(Json(json!({ "message": "Giveaway rerolled", "newWinner": giveaway.winner })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/giveaways", get(list_active))
        .route("/giveaway", post(create_giveaway))
        .route("/giveaway/:id", get(get_giveaway).delete(delete_giveaway))
        .route("/giveaway/:id/join", post(join_giveaway))
        .route("/giveaway/:id/leave", post(leave_giveaway))
        .route("/giveaway/:id/end", post(end_giveaway))
        .route("/giveaway/:id/reroll", post(reroll_giveaway))
        .with_state(state)
}
