//! Record shapes and the partial-update payloads that mutate them.
//!
//! Records are serialized as camelCase documents. Every payload validates
//! itself before it is turned into an [`Update`], so a rejected request never
//! reaches an adapter.

use crate::{
    Document, GiveawayStatus, HavenError, HavenResult, Lookup, Timestamp, Update,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default role bound to the mage track.
pub const DEFAULT_MAGE_ROLE_ID: &str = "1268131583777439825";
/// Default role bound to the knight track.
pub const DEFAULT_KNIGHT_ROLE_ID: &str = "1268229387149643827";

fn default_mage_role_id() -> String {
    DEFAULT_MAGE_ROLE_ID.to_string()
}

fn default_knight_role_id() -> String {
    DEFAULT_KNIGHT_ROLE_ID.to_string()
}

/// Serialize a payload into a flat document, dropping absent fields.
pub fn to_document<T: Serialize>(value: &T) -> HavenResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::invalid("body", "expected an object").into()),
        Err(e) => Err(ValidationError::invalid("body", e.to_string()).into()),
    }
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(())
}

fn non_negative(field: &str, value: Option<i64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::invalid(field, "must not be negative")),
        _ => Ok(()),
    }
}

// ============================================================================
// PROGRESSION USER
// ============================================================================

/// Per-user rank and experience across the mage, knight and sovereign tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionUser {
    pub user_id: String,
    #[serde(default)]
    pub mage_rank: i64,
    #[serde(default)]
    pub mage_xp: i64,
    #[serde(default = "default_mage_role_id")]
    pub mage_role_id: String,
    #[serde(default)]
    pub knight_rank: i64,
    #[serde(default)]
    pub knight_xp: i64,
    #[serde(default = "default_knight_role_id")]
    pub knight_role_id: String,
    #[serde(default)]
    pub sovereign_rank: i64,
    #[serde(default)]
    pub sovereign_xp: i64,
    #[serde(default)]
    pub sovereign_role_id: String,
    #[serde(default)]
    pub living: bool,
    #[serde(default)]
    pub sovereign: bool,
    #[serde(default)]
    pub sovereign_quests_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl ProgressionUser {
    pub fn by_user(user_id: impl Into<String>) -> Lookup {
        Lookup::new("userId", user_id)
    }

    /// Fresh record with every field at its default.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mage_rank: 0,
            mage_xp: 0,
            mage_role_id: default_mage_role_id(),
            knight_rank: 0,
            knight_xp: 0,
            knight_role_id: default_knight_role_id(),
            sovereign_rank: 0,
            sovereign_xp: 0,
            sovereign_role_id: String::new(),
            living: false,
            sovereign: false,
            sovereign_quests_completed: false,
            created_at: None,
        }
    }
}

/// Partial update of a [`ProgressionUser`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProgressionUserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mage_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mage_xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mage_role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knight_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knight_xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knight_role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sovereign_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sovereign_xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sovereign_role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub living: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sovereign: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sovereign_quests_completed: Option<bool>,
}

impl ProgressionUserPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("mageRank", self.mage_rank)?;
        non_negative("mageXp", self.mage_xp)?;
        non_negative("knightRank", self.knight_rank)?;
        non_negative("knightXp", self.knight_xp)?;
        non_negative("sovereignRank", self.sovereign_rank)?;
        non_negative("sovereignXp", self.sovereign_xp)?;
        Ok(())
    }

    /// Build the store update. Defaults for fields the patch leaves out are
    /// written only when the record is created.
    pub fn into_update(self, now: Timestamp) -> HavenResult<Update> {
        self.validate()?;
        let set = to_document(&self)?;
        let mut defaults = to_document(&ProgressionUser::new(""))?;
        defaults.remove("userId");
        Ok(Update::new()
            .set_all(set)
            .set_on_insert_missing(defaults)
            .set_on_insert("createdAt", timestamp_value(now)))
    }
}

// ============================================================================
// MESSAGE TALLY USER
// ============================================================================

/// Per-user counter of RPG channel messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTallyUser {
    pub user_id: String,
    #[serde(default)]
    pub rpg_messages: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl MessageTallyUser {
    pub fn by_user(user_id: impl Into<String>) -> Lookup {
        Lookup::new("userId", user_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageTallyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpg_messages: Option<i64>,
}

impl MessageTallyPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("rpgMessages", self.rpg_messages)
    }

    pub fn into_update(self, now: Timestamp) -> HavenResult<Update> {
        self.validate()?;
        let mut update = Update::new().set_on_insert("createdAt", timestamp_value(now));
        match self.rpg_messages {
            Some(count) => update = update.set("rpgMessages", count),
            None => update = update.set_on_insert("rpgMessages", 0),
        }
        Ok(update)
    }
}

// ============================================================================
// CHANNEL
// ============================================================================

/// One-to-one binding between a user and their personal channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Channel {
    pub fn by_user(user_id: impl Into<String>) -> Lookup {
        Lookup::new("userId", user_id)
    }

    pub fn by_channel(channel_id: impl Into<String>) -> Lookup {
        Lookup::new("channelId", channel_id)
    }
}

/// Request body binding a user to a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBinding {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
}

impl ChannelBinding {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("userId", &self.user_id)?;
        require("channelId", &self.channel_id)?;
        Ok(())
    }

    /// The update keyed by `userId`; moving the user re-points `channelId`.
    pub fn into_update(self, now: Timestamp) -> HavenResult<Update> {
        self.validate()?;
        Ok(Update::new()
            .set("channelId", self.channel_id)
            .set_on_insert("createdAt", timestamp_value(now)))
    }
}

// ============================================================================
// STICKY MESSAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyMessage {
    pub channel_id: String,
    pub message_id: String,
}

impl StickyMessage {
    pub fn by_channel(channel_id: impl Into<String>) -> Lookup {
        Lookup::new("channelId", channel_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StickyMessagePatch {
    #[serde(default)]
    pub message_id: String,
}

impl StickyMessagePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("messageId", &self.message_id)
    }

    pub fn into_update(self) -> HavenResult<Update> {
        self.validate()?;
        Ok(Update::new().set("messageId", self.message_id))
    }
}

// ============================================================================
// BOOSTED ARENA LIST
// ============================================================================

/// Per-guild list of boosted arena members and the message that shows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostedArenaList {
    pub guild_id: String,
    pub message_id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl BoostedArenaList {
    pub fn by_guild(guild_id: impl Into<String>) -> Lookup {
        Lookup::new("guildId", guild_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BoostedArenaPatch {
    #[serde(default)]
    pub message_id: String,
    pub members: Option<Vec<String>>,
}

impl BoostedArenaPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("messageId", &self.message_id)?;
        match &self.members {
            None => Err(ValidationError::missing("members")),
            Some(members) if members.iter().any(|m| m.trim().is_empty()) => Err(
                ValidationError::invalid("members", "member ids must not be empty"),
            ),
            Some(_) => Ok(()),
        }
    }

    /// Replaces the member set wholesale. Duplicates collapse, first
    /// occurrence wins.
    pub fn into_update(self) -> HavenResult<Update> {
        self.validate()?;
        let mut members: Vec<String> = Vec::new();
        for member in self.members.unwrap_or_default() {
            if !members.contains(&member) {
                members.push(member);
            }
        }
        Ok(Update::new()
            .set("messageId", self.message_id)
            .set("members", members))
    }
}

// ============================================================================
// CHANNEL COOLDOWN
// ============================================================================

/// Expiry timestamps of the two cooldown tracks of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCooldown {
    pub channel_id: String,
    #[serde(default)]
    pub emoji_expires_at: Option<Timestamp>,
    #[serde(default)]
    pub name_expires_at: Option<Timestamp>,
}

impl ChannelCooldown {
    pub fn by_channel(channel_id: impl Into<String>) -> Lookup {
        Lookup::new("channelId", channel_id)
    }
}

// ============================================================================
// USERNAME LOG
// ============================================================================

/// Cache-only `username -> userId` mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameLogEntry {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_id: String,
}

impl UsernameLogEntry {
    pub fn by_username(username: impl Into<String>) -> Lookup {
        Lookup::new("username", username)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("username", &self.username)?;
        require("userId", &self.user_id)?;
        Ok(())
    }
}

// ============================================================================
// GIVEAWAY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Giveaway {
    pub giveaway_id: String,
    pub host_id: String,
    pub guild_id: String,
    pub prize: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    pub end_date: Timestamp,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub status: GiveawayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Giveaway {
    pub fn by_id(giveaway_id: impl Into<String>) -> Lookup {
        Lookup::new("giveawayId", giveaway_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == GiveawayStatus::Active
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }
}

/// Request body creating a giveaway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGiveaway {
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub prize: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    pub end_date: Option<Timestamp>,
}

impl NewGiveaway {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("hostId", &self.host_id)?;
        require("guildId", &self.guild_id)?;
        require("prize", &self.prize)?;
        if self.end_date.is_none() {
            return Err(ValidationError::missing("endDate"));
        }
        Ok(())
    }

    /// Materialize the record with a fresh id, active and without entrants.
    pub fn into_giveaway(self, giveaway_id: String, now: Timestamp) -> HavenResult<Giveaway> {
        self.validate()?;
        let end_date = self
            .end_date
            .ok_or_else(|| HavenError::from(ValidationError::missing("endDate")))?;
        Ok(Giveaway {
            giveaway_id,
            host_id: self.host_id,
            guild_id: self.guild_id,
            prize: self.prize,
            requirements: self.requirements,
            allowed_roles: self.allowed_roles,
            participants: Vec::new(),
            end_date,
            winner: None,
            status: GiveawayStatus::Active,
            created_at: Some(now),
        })
    }
}

/// Request body for join/leave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(default)]
    pub user_id: String,
}

impl Membership {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("userId", &self.user_id)
    }
}

/// Timestamps are stored in their serde (RFC 3339) form.
pub fn timestamp_value(ts: Timestamp) -> Value {
    Value::String(ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}
