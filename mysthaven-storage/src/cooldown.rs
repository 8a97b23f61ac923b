//! Channel cooldown policy.
//!
//! Two independent tracks per channel. The stored record carries only the
//! expiry timestamps; whether a track is active is recomputed against the
//! clock on every read, so a cached copy can never report a lapsed cooldown.

use mysthaven_core::{
    timestamp_value, ChannelCooldown, CooldownStatus, CooldownTrack, EntityType, HavenResult,
    Timestamp, Update, ValidationError,
};
use serde_json::Value;
use tracing::info;

use crate::access::{decode, CacheAside};
use crate::cache::{CacheBackend, CacheKey};
use crate::store::DocumentStore;

/// Outcome of setting a cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownSet {
    pub track: CooldownTrack,
    pub expires_at: Timestamp,
    pub status: CooldownStatus,
}

pub struct CooldownPolicy<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    access: CacheAside<C, S>,
}

impl<C, S> CooldownPolicy<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    pub fn new(access: CacheAside<C, S>) -> Self {
        Self { access }
    }

    /// Current status. A channel without a record has no running cooldowns.
    pub async fn status(&self, channel_id: &str) -> HavenResult<CooldownStatus> {
        let lookup = ChannelCooldown::by_channel(channel_id);
        let record = self.access.get::<ChannelCooldown>(&lookup).await?;
        let now = self.access.now();
        Ok(record
            .map(|r| CooldownStatus::derive(&r, now))
            .unwrap_or_else(CooldownStatus::inactive))
    }

    /// Start (or restart) one track. The other track is left untouched.
    pub async fn set(&self, channel_id: &str, track: CooldownTrack) -> HavenResult<CooldownSet> {
        let window = chrono::Duration::from_std(self.access.config().cooldown_window)
            .map_err(|e| ValidationError::invalid("cooldownWindow", e.to_string()))?;
        let now = self.access.now();
        let expires_at = now + window;

        let record = self
            .access
            .upsert::<ChannelCooldown>(
                &ChannelCooldown::by_channel(channel_id),
                Update::new().set(track.field(), timestamp_value(expires_at)),
            )
            .await?;

        let expires_at = record.expires_at(track).unwrap_or(expires_at);
        info!(channel_id, track = %track, %expires_at, "Cooldown set");
        Ok(CooldownSet {
            track,
            expires_at,
            status: CooldownStatus::derive(&record, now),
        })
    }

    /// Clear one track. Never creates a record; the cache entry is purged
    /// whether or not a record existed.
    pub async fn clear(&self, channel_id: &str, track: CooldownTrack) -> HavenResult<CooldownStatus> {
        let lookup = ChannelCooldown::by_channel(channel_id);
        let updated = self
            .access
            .store()
            .find_one_and_update(
                EntityType::ChannelCooldown.collection(),
                &lookup.to_filter(),
                &Update::new().set(track.field(), Value::Null),
                false,
            )
            .await;

        self.access
            .invalidate(&CacheKey::for_lookup(EntityType::ChannelCooldown, &lookup))
            .await;

        let now = self.access.now();
        match updated? {
            Some(doc) => {
                let record = decode::<ChannelCooldown>(doc)?;
                info!(channel_id, track = %track, "Cooldown cleared");
                Ok(CooldownStatus::derive(&record, now))
            }
            None => Ok(CooldownStatus::inactive()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::CacheConfig;
    use crate::cache::InMemoryCacheBackend;
    use crate::store::InMemoryDocumentStore;
    use chrono::{TimeZone, Utc};
    use mysthaven_core::Clock;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Fixed(Mutex<Timestamp>);

    impl Fixed {
        fn advance(&self, by: chrono::Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for Fixed {
        fn now(&self) -> Timestamp {
            *self.0.lock().unwrap()
        }
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    type Policy = CooldownPolicy<InMemoryCacheBackend, InMemoryDocumentStore>;

    fn policy() -> (Policy, Arc<InMemoryCacheBackend>, Arc<InMemoryDocumentStore>) {
        let (policy, cache, store, _) = policy_with_clock();
        (policy, cache, store)
    }

    fn policy_with_clock() -> (
        Policy,
        Arc<InMemoryCacheBackend>,
        Arc<InMemoryDocumentStore>,
        Arc<Fixed>,
    ) {
        let clock = Arc::new(Fixed(Mutex::new(now())));
        let cache = Arc::new(InMemoryCacheBackend::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let access = CacheAside::new(
            Arc::clone(&cache),
            Arc::clone(&store),
            CacheConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (CooldownPolicy::new(access), cache, store, clock)
    }

    fn key(channel_id: &str) -> CacheKey {
        CacheKey::for_lookup(
            EntityType::ChannelCooldown,
            &ChannelCooldown::by_channel(channel_id),
        )
    }

    #[tokio::test]
    async fn test_missing_record_is_inactive_and_uncached() {
        let (policy, cache, _) = policy();
        let status = policy.status("c1").await.unwrap();
        assert_eq!(status, CooldownStatus::inactive());
        assert_eq!(cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_set_emoji_leaves_name_untouched() {
        let (policy, cache, _) = policy();
        let set = policy.set("c1", CooldownTrack::Emoji).await.unwrap();

        assert_eq!(set.expires_at, now() + chrono::Duration::seconds(3600));
        assert!(set.status.emoji_active);
        assert!(!set.status.name_active);
        assert_eq!(set.status.name_expires_at, None);

        let ttl = cache.ttl(&key("c1")).flatten().unwrap();
        assert!(ttl <= Duration::from_secs(3600));
        assert!(ttl > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn test_set_emoji_keeps_running_name_expiry() {
        let (policy, _, store, clock) = policy_with_clock();
        let name_expiry = now() + chrono::Duration::seconds(3600);

        let name = policy.set("c1", CooldownTrack::Name).await.unwrap();
        assert_eq!(name.expires_at, name_expiry);

        clock.advance(chrono::Duration::seconds(600));
        let emoji = policy.set("c1", CooldownTrack::Emoji).await.unwrap();

        let later = now() + chrono::Duration::seconds(600);
        assert_eq!(emoji.expires_at, later + chrono::Duration::seconds(3600));
        assert_eq!(emoji.status.name_expires_at, Some(name_expiry));
        assert!(emoji.status.name_active);

        let stored = store.dump("channelcooldowns");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["nameExpiresAt"], timestamp_value(name_expiry));
        assert_eq!(
            stored[0]["emojiExpiresAt"],
            timestamp_value(later + chrono::Duration::seconds(3600))
        );

        let status = policy.status("c1").await.unwrap();
        assert_eq!(status.name_expires_at, Some(name_expiry));
        assert_eq!(
            status.emoji_expires_at,
            Some(later + chrono::Duration::seconds(3600))
        );
    }

    #[tokio::test]
    async fn test_clear_purges_and_never_creates() {
        let (policy, cache, store) = policy();

        let status = policy.clear("c9", CooldownTrack::Name).await.unwrap();
        assert_eq!(status, CooldownStatus::inactive());
        assert!(store.dump("channelcooldowns").is_empty());

        policy.set("c1", CooldownTrack::Emoji).await.unwrap();
        policy.set("c1", CooldownTrack::Name).await.unwrap();
        assert!(cache.contains(&key("c1")));

        let status = policy.clear("c1", CooldownTrack::Emoji).await.unwrap();
        assert!(!status.emoji_active);
        assert!(status.name_active);
        assert!(!cache.contains(&key("c1")));

        let status = policy.status("c1").await.unwrap();
        assert_eq!(status.emoji_expires_at, None);
        assert!(status.name_active);
    }

    #[tokio::test]
    async fn test_fully_cleared_record_is_not_cached() {
        let (policy, cache, _) = policy();
        policy.set("c1", CooldownTrack::Emoji).await.unwrap();
        policy.clear("c1", CooldownTrack::Emoji).await.unwrap();

        let status = policy.status("c1").await.unwrap();
        assert_eq!(status, CooldownStatus::inactive());
        assert!(!cache.contains(&key("c1")));
    }
}
