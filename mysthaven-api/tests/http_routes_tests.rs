//! HTTP route tests over the full router with in-memory adapters.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use mysthaven_core::{Channel, EntityType};
use mysthaven_storage::CacheKey;
use mysthaven_test_utils::fixtures::fixed_now;
use serde_json::{json, Value};

#[path = "support/app.rs"]
mod test_app;
use test_app::TestApp;

fn timestamp(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(|| panic!("not a timestamp: {}", value))
}

// ============================================================================
// RECORD CRUD
// ============================================================================

#[tokio::test]
async fn test_rxuser_lifecycle() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/rxuser/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");

    let (status, body) = app
        .post("/rxuser/42", json!({ "mageXp": 120, "living": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["user"]["userId"], "42");
    assert_eq!(body["user"]["mageXp"], 120);
    assert_eq!(body["user"]["knightXp"], 0);

    // Partial merge keeps untouched fields.
    let (_, body) = app.post("/rxuser/42", json!({ "knightRank": 2 })).await;
    assert_eq!(body["user"]["mageXp"], 120);
    assert_eq!(body["user"]["knightRank"], 2);

    let (status, body) = app.get("/rxuser/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["knightRank"], 2);

    let (status, _) = app.delete("/rxuser/42").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/rxuser/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/rxuser/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rxuser_rejects_bad_bodies_before_store_access() {
    let app = TestApp::new().await;
    let writes = app.store.write_count();

    let (status, body) = app.post("/rxuser/42", json!({ "mageXp": -5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, _) = app.post("/rxuser/42", json!({ "favouriteColour": "red" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.write_count(), writes);
}

#[tokio::test]
async fn test_mtuser_upsert_defaults_counter() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/mtuser/7", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["rpgMessages"], 0);

    let (_, body) = app.post("/mtuser/7", json!({ "rpgMessages": 31 })).await;
    assert_eq!(body["user"]["rpgMessages"], 31);

    let (status, body) = app.get("/mtuser/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rpgMessages"], 31);
}

#[tokio::test]
async fn test_channel_binding_by_either_key() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/channel").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app.post("/channel", json!({ "userId": "u1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");

    let (status, body) = app
        .post("/channel", json!({ "userId": "u1", "channelId": "c1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel"]["channelId"], "c1");

    let (status, body) = app.get("/channel?channelId=c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "u1");

    // Moving the user drops the old channel key.
    app.post("/channel", json!({ "userId": "u1", "channelId": "c2" }))
        .await;
    let old_key = CacheKey::for_lookup(EntityType::Channel, &Channel::by_channel("c1"));
    assert!(!app.cache.inner().contains(&old_key));
    let (status, _) = app.get("/channel?channelId=c1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/channel?userId=u1").await;
    assert_eq!(body["channelId"], "c2");

    let (status, body) = app
        .post("/channel", json!({ "userId": "u2", "channelId": "c2" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ENTITY_ALREADY_EXISTS");
    assert_eq!(body["details"]["field"], "channelId");

    let (status, _) = app.delete("/channel?channelId=c2").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/channel?userId=u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sticky_and_boosted_arena() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/sticky/c1", json!({ "messageId": "m1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stickyMessage"]["messageId"], "m1");
    let (_, body) = app.get("/sticky/c1").await;
    assert_eq!(body["messageId"], "m1");
    let (status, _) = app.delete("/sticky/c1").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/sticky/c1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/boosted-arena/g1", json!({ "messageId": "m9" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");

    let (status, body) = app
        .post(
            "/boosted-arena/g1",
            json!({ "messageId": "m9", "members": ["a", "b", "a"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["arenaList"]["members"], json!(["a", "b"]));

    app.post("/boosted-arena/g1", json!({ "messageId": "m9", "members": ["c"] }))
        .await;
    let (_, body) = app.get("/boosted-arena/g1").await;
    assert_eq!(body["members"], json!(["c"]));
}

// ============================================================================
// COOLDOWNS
// ============================================================================

#[tokio::test]
async fn test_cooldown_tracks_are_independent() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/cooldown/c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "emojiActive": false,
            "emojiExpiresAt": null,
            "nameActive": false,
            "nameExpiresAt": null,
        })
    );

    let (status, body) = app.post("/cooldown/c1", json!({ "type": "emoji" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        timestamp(&body["expiresAt"]),
        fixed_now() + chrono::Duration::seconds(3600)
    );

    let (_, body) = app.get("/cooldown/c1").await;
    assert_eq!(body["emojiActive"], true);
    assert_eq!(body["nameActive"], false);
    assert_eq!(body["nameExpiresAt"], Value::Null);

    // Expiry is recomputed against the clock, even from a cached record.
    app.clock.advance(chrono::Duration::seconds(3601));
    let (_, body) = app.get("/cooldown/c1").await;
    assert_eq!(body["emojiActive"], false);

    app.post("/cooldown/c1", json!({ "type": "name" })).await;
    let (status, body) = app
        .delete_with("/cooldown/c1", json!({ "type": "name" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["nameActive"], false);
}

#[tokio::test]
async fn test_setting_emoji_keeps_existing_name_cooldown() {
    let app = TestApp::new().await;
    let name_expiry = fixed_now() + chrono::Duration::seconds(3600);

    let (status, body) = app.post("/cooldown/c2", json!({ "type": "name" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timestamp(&body["expiresAt"]), name_expiry);

    app.clock.advance(chrono::Duration::seconds(900));
    let (status, body) = app.post("/cooldown/c2", json!({ "type": "emoji" })).await;
    assert_eq!(status, StatusCode::OK);

    let emoji_expiry = fixed_now() + chrono::Duration::seconds(900 + 3600);
    assert_eq!(timestamp(&body["expiresAt"]), emoji_expiry);
    assert_eq!(timestamp(&body["status"]["nameExpiresAt"]), name_expiry);
    assert_eq!(body["status"]["nameActive"], true);

    let stored = app.store.dump("channelcooldowns");
    assert_eq!(stored.len(), 1);
    assert_eq!(timestamp(&stored[0]["nameExpiresAt"]), name_expiry);
    assert_eq!(timestamp(&stored[0]["emojiExpiresAt"]), emoji_expiry);

    let (_, body) = app.get("/cooldown/c2").await;
    assert_eq!(timestamp(&body["nameExpiresAt"]), name_expiry);
    assert_eq!(timestamp(&body["emojiExpiresAt"]), emoji_expiry);
}

#[tokio::test]
async fn test_cooldown_rejects_unknown_track() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/cooldown/c1", json!({ "type": "avatar" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = app.post("/cooldown/c1", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

// ============================================================================
// USERNAME LOG
// ============================================================================

#[tokio::test]
async fn test_ttlog_lifecycle() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/ttLog/mystic").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/ttLog", json!({ "username": "mystic" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/ttLog", json!({ "username": "mystic", "userId": "99" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ttLog entry set");

    let (status, body) = app.get("/ttLog/mystic").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "username": "mystic", "userId": "99" }));
    assert!(app.store.dump("ttlog").is_empty());

    let (status, _) = app.delete("/ttLog/mystic").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete("/ttLog/mystic").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// GIVEAWAYS
// ============================================================================

async fn create_giveaway(app: &TestApp) -> String {
    let (status, body) = app
        .post(
            "/giveaway",
            json!({
                "hostId": "1",
                "guildId": "2",
                "prize": "Nitro",
                "endDate": "2025-03-08T12:00:00Z",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["giveaway"]["status"], "active");
    assert_eq!(body["giveaway"]["winner"], Value::Null);
    body["giveaway"]["giveawayId"]
        .as_str()
        .expect("giveaway id")
        .to_string()
}

#[tokio::test]
async fn test_giveaway_lifecycle() {
    let app = TestApp::new().await;
    let id = create_giveaway(&app).await;

    let (_, body) = app.get("/giveaways").await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let join = format!("/giveaway/{}/join", id);
    let (status, _) = app.post(&join, json!({ "userId": "u1" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.post(&join, json!({ "userId": "u1" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STATE_CONFLICT");
    let (status, _) = app.post(&join, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    app.post(&join, json!({ "userId": "u2" })).await;

    let (status, _) = app
        .post(&format!("/giveaway/{}/leave", id), json!({ "userId": "nobody" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post_empty(&format!("/giveaway/{}/reroll", id)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.post_empty(&format!("/giveaway/{}/end", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Giveaway ended");
    let first = body["winner"].as_str().expect("winner").to_string();
    assert!(first == "u1" || first == "u2");

    let (_, body) = app.get("/giveaways").await;
    assert_eq!(body, json!([]));

    let (status, _) = app.post_empty(&format!("/giveaway/{}/end", id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.post(&join, json!({ "userId": "u3" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.post_empty(&format!("/giveaway/{}/reroll", id)).await;
    assert_eq!(status, StatusCode::OK);
    let second = body["newWinner"].as_str().expect("new winner");
    assert_ne!(second, first);

    let (_, body) = app.get(&format!("/giveaway/{}", id)).await;
    assert_eq!(body["status"], "ended");
    assert_eq!(body["winner"], second);

    let (status, _) = app.delete(&format!("/giveaway/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/giveaway/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_giveaway_end_without_participants() {
    let app = TestApp::new().await;
    let id = create_giveaway(&app).await;

    let (status, body) = app.post_empty(&format!("/giveaway/{}/end", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Giveaway ended with no participants");
    assert_eq!(body["winner"], Value::Null);

    let (status, _) = app.post_empty("/giveaway/missing/end").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_giveaway_create_requires_fields() {
    let app = TestApp::new().await;
    let (status, body) = app.post("/giveaway", json!({ "hostId": "1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

// ============================================================================
// ADAPTER FAILURES
// ============================================================================

#[tokio::test]
async fn test_cache_read_failure_is_service_unavailable() {
    let app = TestApp::new().await;
    app.cache.fail_reads(true);

    let (status, body) = app.get("/sticky/c1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_cache_write_failure_does_not_fail_committed_write() {
    let app = TestApp::new().await;
    app.cache.fail_writes(true);

    let (status, _) = app.post("/sticky/c1", json!({ "messageId": "m1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.dump("stickymessages").len(), 1);

    app.cache.fail_writes(false);
    let (status, body) = app.get("/sticky/c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messageId"], "m1");
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let app = TestApp::new().await;
    app.store.set_offline(true);

    let (status, _) = app.get("/rxuser/1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// OPERATIONAL ROUTES
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/health/ping").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["cache"]["status"], "healthy");
    assert_eq!(body["details"]["store"]["status"], "healthy");

    app.cache.fail_reads(true);
    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["details"]["cache"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_and_unknown_routes() {
    let app = TestApp::new().await;
    app.get("/rxuser/1").await;

    let (status, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
}
