//! Cooldown status derivation.

use crate::{ChannelCooldown, CooldownTrack, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cooldown state of a channel as reported to callers.
///
/// The booleans are derived against the current clock and are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub emoji_active: bool,
    pub emoji_expires_at: Option<Timestamp>,
    pub name_active: bool,
    pub name_expires_at: Option<Timestamp>,
}

impl CooldownStatus {
    /// Status of a channel without any cooldown record.
    pub fn inactive() -> Self {
        Self {
            emoji_active: false,
            emoji_expires_at: None,
            name_active: false,
            name_expires_at: None,
        }
    }

    pub fn derive(record: &ChannelCooldown, now: Timestamp) -> Self {
        Self {
            emoji_active: is_active(record.emoji_expires_at, now),
            emoji_expires_at: record.emoji_expires_at,
            name_active: is_active(record.name_expires_at, now),
            name_expires_at: record.name_expires_at,
        }
    }

    pub fn is_active(&self, track: CooldownTrack) -> bool {
        match track {
            CooldownTrack::Emoji => self.emoji_active,
            CooldownTrack::Name => self.name_active,
        }
    }
}

/// A track is active iff its expiry exists and lies strictly after `now`.
pub fn is_active(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    matches!(expires_at, Some(at) if at > now)
}

impl ChannelCooldown {
    pub fn expires_at(&self, track: CooldownTrack) -> Option<Timestamp> {
        match track {
            CooldownTrack::Emoji => self.emoji_expires_at,
            CooldownTrack::Name => self.name_expires_at,
        }
    }

    /// How long a cached copy of this record may live.
    ///
    /// Bounded by the latest non-null expiry. `None` when every track is
    /// null or already past: such a record must not be cached.
    pub fn derived_ttl(&self, now: Timestamp) -> Option<Duration> {
        [self.emoji_expires_at, self.name_expires_at]
            .into_iter()
            .flatten()
            .max()
            .and_then(|latest| (latest - now).to_std().ok())
            .filter(|ttl| ttl.as_secs() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn cooldown(emoji: Option<i64>, name: Option<i64>) -> ChannelCooldown {
        ChannelCooldown {
            channel_id: "c1".to_string(),
            emoji_expires_at: emoji.map(|s| now() + ChronoDuration::seconds(s)),
            name_expires_at: name.map(|s| now() + ChronoDuration::seconds(s)),
        }
    }

    #[test]
    fn test_inactive_default() {
        let status = CooldownStatus::inactive();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "emojiActive": false,
                "emojiExpiresAt": null,
                "nameActive": false,
                "nameExpiresAt": null
            })
        );
    }

    #[test]
    fn test_derive_strictly_after_now() {
        let status = CooldownStatus::derive(&cooldown(Some(0), Some(1)), now());
        assert!(!status.emoji_active);
        assert!(status.name_active);
        assert!(status.is_active(CooldownTrack::Name));
    }

    #[test]
    fn test_ttl_uses_latest_non_null_expiry() {
        assert_eq!(
            cooldown(None, Some(1800)).derived_ttl(now()),
            Some(Duration::from_secs(1800))
        );
        assert_eq!(
            cooldown(Some(60), Some(3600)).derived_ttl(now()),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_ttl_none_when_null_or_past() {
        assert_eq!(cooldown(None, None).derived_ttl(now()), None);
        assert_eq!(cooldown(Some(-10), None).derived_ttl(now()), None);
        assert_eq!(cooldown(Some(0), Some(-5)).derived_ttl(now()), None);
    }
}
