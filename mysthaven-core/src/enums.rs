//! Enum types for Mysthaven records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPES
// ============================================================================

/// Entity type discriminator used for collection names, cache keys and
/// error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ProgressionUser,
    MessageTallyUser,
    Channel,
    StickyMessage,
    BoostedArenaList,
    ChannelCooldown,
    UsernameLogEntry,
    Giveaway,
}

impl EntityType {
    /// Name of the durable-store collection holding this entity.
    ///
    /// These match the collection names of the existing deployment so that
    /// data written before the migration stays readable.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::ProgressionUser => "rxusers",
            EntityType::MessageTallyUser => "mtusers",
            EntityType::Channel => "channels",
            EntityType::StickyMessage => "stickymessages",
            EntityType::BoostedArenaList => "boostedarenalists",
            EntityType::ChannelCooldown => "channelcooldowns",
            EntityType::UsernameLogEntry => "ttlog",
            EntityType::Giveaway => "giveaways",
        }
    }

    /// Whether the entity has a durable-store backing at all.
    pub fn is_durable(&self) -> bool {
        !matches!(self, EntityType::UsernameLogEntry)
    }

    /// Snake-case label used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::ProgressionUser => "progression_user",
            EntityType::MessageTallyUser => "message_tally_user",
            EntityType::Channel => "channel",
            EntityType::StickyMessage => "sticky_message",
            EntityType::BoostedArenaList => "boosted_arena_list",
            EntityType::ChannelCooldown => "channel_cooldown",
            EntityType::UsernameLogEntry => "username_log_entry",
            EntityType::Giveaway => "giveaway",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::ProgressionUser => "ProgressionUser",
            EntityType::MessageTallyUser => "MessageTallyUser",
            EntityType::Channel => "Channel",
            EntityType::StickyMessage => "StickyMessage",
            EntityType::BoostedArenaList => "BoostedArenaList",
            EntityType::ChannelCooldown => "ChannelCooldown",
            EntityType::UsernameLogEntry => "UsernameLogEntry",
            EntityType::Giveaway => "Giveaway",
        };
        write!(f, "{}", value)
    }
}

// ============================================================================
// GIVEAWAY STATUS
// ============================================================================

/// Lifecycle status of a giveaway. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiveawayStatus {
    #[default]
    Active,
    Ended,
}

impl GiveawayStatus {
    /// Stored string form.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            GiveawayStatus::Active => "active",
            GiveawayStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for GiveawayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ============================================================================
// COOLDOWN TRACKS
// ============================================================================

/// One of the two independent cooldown tracks kept per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownTrack {
    Emoji,
    Name,
}

impl CooldownTrack {
    /// Document field holding this track's expiry timestamp.
    pub fn field(&self) -> &'static str {
        match self {
            CooldownTrack::Emoji => "emojiExpiresAt",
            CooldownTrack::Name => "nameExpiresAt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownTrack::Emoji => "emoji",
            CooldownTrack::Name => "name",
        }
    }
}

impl fmt::Display for CooldownTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when parsing an unknown cooldown track name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownTrackParseError(pub String);

impl fmt::Display for CooldownTrackParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid cooldown type: {}", self.0)
    }
}

impl std::error::Error for CooldownTrackParseError {}

impl FromStr for CooldownTrack {
    type Err = CooldownTrackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "emoji" => Ok(CooldownTrack::Emoji),
            "name" => Ok(CooldownTrack::Name),
            _ => Err(CooldownTrackParseError(s.to_string())),
        }
    }
}
