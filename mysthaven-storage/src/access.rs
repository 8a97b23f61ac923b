//! Cache-aside access layer.
//!
//! Composes a [`CacheBackend`] and a [`DocumentStore`] into the uniform
//! read-through / write-refresh / delete-purge contract every record type is
//! served through.
//!
//! Ordering rules:
//! - reads consult the cache first and fall back to the store; a store miss is
//!   never cached
//! - mutations commit to the store before the cache is touched
//! - cache failures after a committed store write are logged, never returned
//! - a failing cache *read* is returned as an error

use std::sync::Arc;
use std::time::Duration;

use mysthaven_core::{
    Clock, Document, EntityType, Filter, HavenResult, Lookup, StorageError, Timestamp, Update,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheKey};
use crate::store::DocumentStore;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// TTL policy for cached records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for records without a dedicated policy.
    pub default_ttl: Duration,
    /// TTL for Channel records (both keys).
    pub channel_ttl: Duration,
    /// Length of a cooldown once set.
    pub cooldown_window: Duration,
    /// TTL of the active-giveaways aggregate.
    pub active_giveaways_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            channel_ttl: Duration::from_secs(3600),
            cooldown_window: Duration::from_secs(3600),
            active_giveaways_ttl: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_channel_ttl(mut self, ttl: Duration) -> Self {
        self.channel_ttl = ttl;
        self
    }

    pub fn with_cooldown_window(mut self, window: Duration) -> Self {
        self.cooldown_window = window;
        self
    }

    pub fn with_active_giveaways_ttl(mut self, ttl: Duration) -> Self {
        self.active_giveaways_ttl = ttl;
        self
    }

    /// Fixed TTL for an entity type.
    pub fn ttl_for(&self, entity_type: EntityType) -> Duration {
        match entity_type {
            EntityType::Channel => self.channel_ttl,
            _ => self.default_ttl,
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// A durable record served through the access layer.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn entity_type() -> EntityType;

    /// Independently unique fields, the primary key first.
    fn unique_fields() -> &'static [&'static str];

    /// One lookup per unique field, each naming a cache key of this record.
    fn lookups(&self) -> Vec<Lookup>;

    /// Lifetime of a cached copy. `None` means the record must not be cached.
    fn cache_ttl(&self, config: &CacheConfig, _now: Timestamp) -> Option<Duration> {
        Some(config.ttl_for(Self::entity_type()))
    }

    fn cache_keys(&self) -> Vec<CacheKey> {
        self.lookups()
            .iter()
            .map(|lookup| CacheKey::for_lookup(Self::entity_type(), lookup))
            .collect()
    }
}

pub(crate) fn decode<R: Record>(doc: Document) -> HavenResult<R> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        StorageError::MalformedDocument {
            collection: R::entity_type().collection().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

// ============================================================================
// OBSERVATION
// ============================================================================

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupOutcome {
    /// Served from cache.
    Hit,
    /// Cache miss, served from the durable store.
    Miss,
    /// Absent from both.
    StoreMiss,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::StoreMiss => "store_miss",
        }
    }
}

/// Receives the outcome of every keyed read. Used for metrics.
pub trait LookupObserver: Send + Sync {
    fn observe(&self, entity_type: EntityType, outcome: LookupOutcome);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LookupObserver for NoopObserver {
    fn observe(&self, _entity_type: EntityType, _outcome: LookupOutcome) {}
}

// ============================================================================
// ACCESS LAYER
// ============================================================================

/// Cache-aside composition of a cache and a document store.
///
/// Stateless apart from its injected capabilities; cheap to clone and safe to
/// share across tasks.
pub struct CacheAside<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    cache: Arc<C>,
    store: Arc<S>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn LookupObserver>,
}

impl<C, S> Clone for CacheAside<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<C, S> CacheAside<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    pub fn new(cache: Arc<C>, store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            store,
            config,
            clock,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Read-through lookup.
    pub async fn get<R: Record>(&self, lookup: &Lookup) -> HavenResult<Option<R>> {
        let entity_type = R::entity_type();
        let key = CacheKey::for_lookup(entity_type, lookup);

        if let Some(payload) = self.cache.get(&key).await? {
            match serde_json::from_str::<R>(&payload) {
                Ok(record) => {
                    debug!(key = %key, "Cache hit");
                    self.observer.observe(entity_type, LookupOutcome::Hit);
                    return Ok(Some(record));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    self.invalidate(&key).await;
                }
            }
        }

        let Some(record) = self.load::<R>(lookup).await? else {
            debug!(key = %key, "Not found in store");
            self.observer.observe(entity_type, LookupOutcome::StoreMiss);
            return Ok(None);
        };

        debug!(key = %key, "Cache miss, populated from store");
        self.observer.observe(entity_type, LookupOutcome::Miss);
        self.populate(&key, &record).await;
        Ok(Some(record))
    }

    /// Read straight from the durable store, bypassing the cache.
    pub async fn load<R: Record>(&self, lookup: &Lookup) -> HavenResult<Option<R>> {
        self.find::<R>(&lookup.to_filter()).await
    }

    /// First record matching an arbitrary filter, from the durable store.
    pub async fn find<R: Record>(&self, filter: &Filter) -> HavenResult<Option<R>> {
        self.store
            .find_one(R::entity_type().collection(), filter)
            .await?
            .map(decode::<R>)
            .transpose()
    }

    /// Insert-or-merge keyed by `lookup`, then refresh every key of the record.
    ///
    /// For records with more than one unique field, keys that indexed the
    /// previous version and no longer do are purged first.
    pub async fn upsert<R: Record>(&self, lookup: &Lookup, update: Update) -> HavenResult<R> {
        let entity_type = R::entity_type();
        let collection = entity_type.collection();
        let filter = lookup.to_filter();

        let previous = if R::unique_fields().len() > 1 {
            self.find::<R>(&filter).await?
        } else {
            None
        };

        let doc = self
            .store
            .find_one_and_update(collection, &filter, &update, true)
            .await?
            .ok_or_else(|| StorageError::Unavailable {
                reason: format!("upsert into {} returned no document", collection),
            })?;
        let record = decode::<R>(doc)?;

        if let Some(previous) = previous {
            let current = record.cache_keys();
            for stale in previous.cache_keys() {
                if !current.contains(&stale) {
                    debug!(key = %stale, "Purging re-keyed cache entry");
                    self.invalidate(&stale).await;
                }
            }
        }

        self.refresh(&record).await;
        Ok(record)
    }

    /// Conditional update without upsert. `None` when the filter matched
    /// nothing; on success every key of the record is refreshed.
    pub async fn update_where<R: Record>(
        &self,
        filter: &Filter,
        update: Update,
    ) -> HavenResult<Option<R>> {
        let Some(doc) = self
            .store
            .find_one_and_update(R::entity_type().collection(), filter, &update, false)
            .await?
        else {
            return Ok(None);
        };
        let record = decode::<R>(doc)?;
        self.refresh(&record).await;
        Ok(Some(record))
    }

    /// Remove the record and purge every key that indexed it.
    ///
    /// `None` when nothing was stored under `lookup`; the requested key is
    /// purged either way.
    pub async fn delete<R: Record>(&self, lookup: &Lookup) -> HavenResult<Option<R>> {
        let entity_type = R::entity_type();
        let requested = CacheKey::for_lookup(entity_type, lookup);

        let removed = self
            .store
            .find_one_and_delete(entity_type.collection(), &lookup.to_filter())
            .await;

        self.invalidate(&requested).await;
        let Some(doc) = removed? else {
            return Ok(None);
        };

        let record = decode::<R>(doc)?;
        for key in record.cache_keys() {
            if key != requested {
                self.invalidate(&key).await;
            }
        }
        Ok(Some(record))
    }

    /// Insert a fully-formed record and cache it.
    pub async fn insert<R: Record>(&self, record: &R) -> HavenResult<()> {
        let doc = mysthaven_core::to_document(record)?;
        self.store
            .insert_one(R::entity_type().collection(), doc)
            .await?;
        self.refresh(record).await;
        Ok(())
    }

    /// Read-through over an aggregate list stored under `key`.
    pub async fn get_list<R: Record>(
        &self,
        key: &CacheKey,
        filter: &Filter,
        ttl: Duration,
    ) -> HavenResult<Vec<R>> {
        if let Some(payload) = self.cache.get(key).await? {
            match serde_json::from_str::<Vec<R>>(&payload) {
                Ok(records) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(records);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    self.invalidate(key).await;
                }
            }
        }

        let records = self
            .store
            .find_many(R::entity_type().collection(), filter)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect::<HavenResult<Vec<R>>>()?;

        match serde_json::to_string(&records) {
            Ok(payload) => {
                if let Err(e) = self.cache.set_ex(key, ttl, payload).await {
                    warn!(key = %key, error = %e, "Failed to populate cache");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize aggregate"),
        }
        Ok(records)
    }

    /// Write the record under every key that indexes it, or purge those keys
    /// when the record must not be cached.
    pub async fn refresh<R: Record>(&self, record: &R) {
        for key in record.cache_keys() {
            self.populate(&key, record).await;
        }
    }

    /// Best-effort purge. Failures are logged.
    pub async fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = self.cache.del(key).await {
            warn!(key = %key, error = %e, "Failed to purge cache entry");
        }
    }

    async fn populate<R: Record>(&self, key: &CacheKey, record: &R) {
        let Some(ttl) = record.cache_ttl(&self.config, self.clock.now()) else {
            debug!(key = %key, "Record not cacheable, purging");
            self.invalidate(key).await;
            return;
        };
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize record for cache");
                self.invalidate(key).await;
                return;
            }
        };
        if let Err(e) = self.cache.set_ex(key, ttl, payload).await {
            warn!(key = %key, error = %e, "Failed to refresh cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use crate::records::ensure_indexes;
    use crate::store::InMemoryDocumentStore;
    use chrono::{TimeZone, Utc};
    use mysthaven_core::{
        Channel, ChannelBinding, GiveawayStatus, HavenError, ProgressionUser,
        ProgressionUserPatch, StickyMessage, StickyMessagePatch,
    };
    use std::sync::Mutex;

    struct Fixed;

    impl Clock for Fixed {
        fn now(&self) -> Timestamp {
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<LookupOutcome>>);

    impl LookupObserver for Recording {
        fn observe(&self, _entity_type: EntityType, outcome: LookupOutcome) {
            self.0.lock().unwrap().push(outcome);
        }
    }

    type Access = CacheAside<InMemoryCacheBackend, InMemoryDocumentStore>;

    fn access() -> (Access, Arc<InMemoryCacheBackend>, Arc<InMemoryDocumentStore>) {
        let cache = Arc::new(InMemoryCacheBackend::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let access = CacheAside::new(
            Arc::clone(&cache),
            Arc::clone(&store),
            CacheConfig::default(),
            Arc::new(Fixed),
        );
        (access, cache, store)
    }

    fn sticky_key(channel_id: &str) -> CacheKey {
        CacheKey::for_lookup(EntityType::StickyMessage, &StickyMessage::by_channel(channel_id))
    }

    fn sticky_update(message_id: &str) -> Update {
        StickyMessagePatch {
            message_id: message_id.into(),
        }
        .into_update()
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_miss_is_not_cached() {
        let (access, cache, _) = access();
        let found = access
            .get::<StickyMessage>(&StickyMessage::by_channel("c1"))
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_then_get_is_served_from_cache() {
        let (access, cache, store) = access();
        let recording = Arc::new(Recording::default());
        let access = access.with_observer(recording.clone());
        let lookup = StickyMessage::by_channel("c1");

        let written = access
            .upsert::<StickyMessage>(&lookup, sticky_update("m1"))
            .await
            .unwrap();
        let ttl = cache.ttl(&sticky_key("c1")).flatten().unwrap();
        assert!(ttl <= Duration::from_secs(600) && ttl > Duration::from_secs(590));

        let reads = store.read_count();
        let read = access.get::<StickyMessage>(&lookup).await.unwrap();
        assert_eq!(read, Some(written));
        assert_eq!(store.read_count(), reads);
        assert_eq!(*recording.0.lock().unwrap(), vec![LookupOutcome::Hit]);
    }

    #[tokio::test]
    async fn test_miss_populates_from_store() {
        let (access, cache, store) = access();
        let lookup = StickyMessage::by_channel("c1");
        access
            .upsert::<StickyMessage>(&lookup, sticky_update("m1"))
            .await
            .unwrap();
        cache.del(&sticky_key("c1")).await.unwrap();

        let reads = store.read_count();
        let read = access.get::<StickyMessage>(&lookup).await.unwrap().unwrap();
        assert_eq!(read.message_id, "m1");
        assert!(store.read_count() > reads);
        assert!(cache.contains(&sticky_key("c1")));
    }

    #[tokio::test]
    async fn test_repeated_upsert_is_idempotent() {
        let (access, _, store) = access();
        let lookup = ProgressionUser::by_user("u1");
        let patch = ProgressionUserPatch {
            mage_xp: Some(40),
            ..Default::default()
        };

        let first = access
            .upsert::<ProgressionUser>(&lookup, patch.clone().into_update(Fixed.now()).unwrap())
            .await
            .unwrap();
        let second = access
            .upsert::<ProgressionUser>(&lookup, patch.into_update(Fixed.now()).unwrap())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.dump("rxusers").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_purges_cached_copy() {
        let (access, cache, _) = access();
        let lookup = StickyMessage::by_channel("c1");
        access
            .upsert::<StickyMessage>(&lookup, sticky_update("m1"))
            .await
            .unwrap();
        access.get::<StickyMessage>(&lookup).await.unwrap();

        let removed = access.delete::<StickyMessage>(&lookup).await.unwrap();
        assert!(removed.is_some());
        assert!(!cache.contains(&sticky_key("c1")));
        assert!(access.get::<StickyMessage>(&lookup).await.unwrap().is_none());
        assert!(access.delete::<StickyMessage>(&lookup).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_rekey_purges_previous_channel_key() {
        let (access, cache, store) = access();
        ensure_indexes(store.as_ref()).await.unwrap();

        let bind = |channel_id: &str| ChannelBinding {
            user_id: "u1".into(),
            channel_id: channel_id.into(),
        };
        let by_channel = |channel_id: &str| {
            CacheKey::for_lookup(EntityType::Channel, &Channel::by_channel(channel_id))
        };

        access
            .upsert::<Channel>(&Channel::by_user("u1"), bind("c1").into_update(Fixed.now()).unwrap())
            .await
            .unwrap();
        assert!(cache.contains(&by_channel("c1")));

        let moved = access
            .upsert::<Channel>(&Channel::by_user("u1"), bind("c2").into_update(Fixed.now()).unwrap())
            .await
            .unwrap();
        assert_eq!(moved.channel_id, "c2");
        assert!(!cache.contains(&by_channel("c1")));
        assert!(cache.contains(&by_channel("c2")));
        assert!(access
            .get::<Channel>(&Channel::by_channel("c1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_channel_owned_by_other_user_is_duplicate() {
        let (access, _, store) = access();
        ensure_indexes(store.as_ref()).await.unwrap();

        let bind = |user_id: &str| ChannelBinding {
            user_id: user_id.into(),
            channel_id: "c1".into(),
        };
        access
            .upsert::<Channel>(&Channel::by_user("u1"), bind("u1").into_update(Fixed.now()).unwrap())
            .await
            .unwrap();
        let err = access
            .upsert::<Channel>(&Channel::by_user("u2"), bind("u2").into_update(Fixed.now()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HavenError::Storage(StorageError::DuplicateKey { ref field, .. }) if field == "channelId"
        ));
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_purged() {
        let (access, cache, _) = access();
        let lookup = StickyMessage::by_channel("c1");
        access
            .upsert::<StickyMessage>(&lookup, sticky_update("m1"))
            .await
            .unwrap();
        cache
            .set(&sticky_key("c1"), "{not json".to_string())
            .await
            .unwrap();

        let read = access.get::<StickyMessage>(&lookup).await.unwrap().unwrap();
        assert_eq!(read.message_id, "m1");
        assert_eq!(
            cache.peek(&sticky_key("c1")).map(|p| p.contains("m1")),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_store_outage_fails_reads() {
        let (access, _, store) = access();
        store.set_offline(true);
        let err = access
            .get::<StickyMessage>(&StickyMessage::by_channel("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, HavenError::Storage(StorageError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_get_list_caches_aggregate() {
        let (access, cache, store) = access();
        let key = CacheKey::active_giveaways();
        let filter = Filter::by("status", GiveawayStatus::Active.as_db_str());

        let empty: Vec<mysthaven_core::Giveaway> = access
            .get_list(&key, &filter, Duration::from_secs(600))
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(cache.peek(&key).as_deref(), Some("[]"));

        let reads = store.read_count();
        let _: Vec<mysthaven_core::Giveaway> = access
            .get_list(&key, &filter, Duration::from_secs(600))
            .await
            .unwrap();
        assert_eq!(store.read_count(), reads);
    }
}
