//! Mysthaven Test Utilities
//!
//! Centralized test infrastructure for the Mysthaven workspace:
//! - Proptest generators for ids and request payloads
//! - A controllable clock and a cache that fails on demand
//! - Fixtures and a wired-up access layer over in-memory adapters
//! - Assertions on the error taxonomy

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

// Re-export core types for convenience
pub use mysthaven_core::{
    BoostedArenaPatch, CacheError, ChannelBinding, Clock, EntityType, HavenError, HavenResult,
    MessageTallyPatch, NewGiveaway, ProgressionUserPatch, StateError, StickyMessagePatch,
    StorageError, Timestamp, UsernameLogEntry, ValidationError,
};
pub use mysthaven_storage::{
    CacheAside, CacheBackend, CacheConfig, CacheKey, CacheStats, InMemoryCacheBackend,
    InMemoryDocumentStore,
};

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(fixtures::fixed_now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ============================================================================
// FAILING CACHE
// ============================================================================

/// In-memory cache whose reads and writes can be switched to fail.
///
/// Writes cover `set`, `set_ex` and `del`.
#[derive(Debug, Default)]
pub struct FailingCache {
    inner: InMemoryCacheBackend,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> HavenResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: format!("injected {} failure", op),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, key: &CacheKey) -> HavenResult<Option<String>> {
        self.check(&self.fail_reads, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: String) -> HavenResult<()> {
        self.check(&self.fail_writes, "set")?;
        self.inner.set(key, value).await
    }

    async fn set_ex(&self, key: &CacheKey, ttl: Duration, value: String) -> HavenResult<()> {
        self.check(&self.fail_writes, "set_ex")?;
        self.inner.set_ex(key, ttl, value).await
    }

    async fn del(&self, key: &CacheKey) -> HavenResult<u64> {
        self.check(&self.fail_writes, "del")?;
        self.inner.del(key).await
    }

    async fn ping(&self) -> HavenResult<()> {
        self.check(&self.fail_reads, "ping")?;
        self.inner.ping().await
    }

    async fn stats(&self) -> HavenResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Access layer over in-memory adapters with handles kept for inspection.
pub struct Harness<C: CacheBackend = InMemoryCacheBackend> {
    pub cache: Arc<C>,
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: Arc<FixedClock>,
    pub access: CacheAside<C, InMemoryDocumentStore>,
}

impl Harness<InMemoryCacheBackend> {
    pub fn new() -> Self {
        Self::with_cache(InMemoryCacheBackend::new())
    }
}

impl Default for Harness<InMemoryCacheBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CacheBackend> Harness<C> {
    pub fn with_cache(cache: C) -> Self {
        Self::with_config(cache, CacheConfig::default())
    }

    pub fn with_config(cache: C, config: CacheConfig) -> Self {
        let cache = Arc::new(cache);
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(FixedClock::default());
        let access = CacheAside::new(
            Arc::clone(&cache),
            Arc::clone(&store),
            config,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Self {
            cache,
            store,
            clock,
            access,
        }
    }
}

pub mod generators {
    //! Proptest strategies for ids and request payloads.

    use super::*;
    use proptest::prelude::*;

    /// Discord-style snowflake id.
    pub fn arb_snowflake() -> impl Strategy<Value = String> {
        "[1-9][0-9]{16,18}"
    }

    pub fn arb_username() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_.]{1,31}"
    }

    /// Timestamp within 2020-2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(fixtures::fixed_now)
        })
    }

    fn arb_counter() -> impl Strategy<Value = Option<i64>> {
        proptest::option::of(0i64..1_000_000)
    }

    /// Valid progression patch; any subset of fields may be present.
    pub fn arb_progression_patch() -> impl Strategy<Value = ProgressionUserPatch> {
        (
            (arb_counter(), arb_counter(), arb_counter(), arb_counter()),
            (arb_counter(), arb_counter()),
            proptest::option::of(arb_snowflake()),
            (
                proptest::option::of(any::<bool>()),
                proptest::option::of(any::<bool>()),
                proptest::option::of(any::<bool>()),
            ),
        )
            .prop_map(
                |(
                    (mage_rank, mage_xp, knight_rank, knight_xp),
                    (sovereign_rank, sovereign_xp),
                    sovereign_role_id,
                    (living, sovereign, sovereign_quests_completed),
                )| ProgressionUserPatch {
                    mage_rank,
                    mage_xp,
                    knight_rank,
                    knight_xp,
                    sovereign_rank,
                    sovereign_xp,
                    sovereign_role_id,
                    living,
                    sovereign,
                    sovereign_quests_completed,
                    ..Default::default()
                },
            )
    }

    pub fn arb_channel_binding() -> impl Strategy<Value = ChannelBinding> {
        (arb_snowflake(), arb_snowflake()).prop_map(|(user_id, channel_id)| ChannelBinding {
            user_id,
            channel_id,
        })
    }

    pub fn arb_sticky_patch() -> impl Strategy<Value = StickyMessagePatch> {
        arb_snowflake().prop_map(|message_id| StickyMessagePatch { message_id })
    }

    pub fn arb_boosted_patch() -> impl Strategy<Value = BoostedArenaPatch> {
        (
            arb_snowflake(),
            proptest::collection::vec(arb_snowflake(), 0..8),
        )
            .prop_map(|(message_id, members)| BoostedArenaPatch {
                message_id,
                members: Some(members),
            })
    }

    pub fn arb_username_entry() -> impl Strategy<Value = UsernameLogEntry> {
        (arb_username(), arb_snowflake())
            .prop_map(|(username, user_id)| UsernameLogEntry { username, user_id })
    }

    /// Distinct participant ids.
    pub fn arb_participants(max: usize) -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set(arb_snowflake(), 0..max)
            .prop_map(|set| set.into_iter().collect())
    }
}

pub mod fixtures {
    //! Pre-built records and requests for common scenarios.

    use super::*;
    use chrono::TimeZone;

    /// 2025-03-01T12:00:00Z.
    pub fn fixed_now() -> Timestamp {
        chrono::Utc
            .with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn progression_patch() -> ProgressionUserPatch {
        ProgressionUserPatch {
            mage_rank: Some(3),
            mage_xp: Some(1250),
            living: Some(true),
            ..Default::default()
        }
    }

    pub fn tally_patch(rpg_messages: i64) -> MessageTallyPatch {
        MessageTallyPatch {
            rpg_messages: Some(rpg_messages),
        }
    }

    pub fn channel_binding(user_id: &str, channel_id: &str) -> ChannelBinding {
        ChannelBinding {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    pub fn new_giveaway(end_date: Timestamp) -> NewGiveaway {
        NewGiveaway {
            host_id: "100000000000000001".to_string(),
            guild_id: "200000000000000002".to_string(),
            prize: "Nitro".to_string(),
            requirements: "Be level 5".to_string(),
            allowed_roles: vec!["300000000000000003".to_string()],
            end_date: Some(end_date),
        }
    }

    pub fn username_entry(username: &str, user_id: &str) -> UsernameLogEntry {
        UsernameLogEntry {
            username: username.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

pub mod assertions {
    //! Assertions on the error taxonomy.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &HavenResult<T>, entity_type: EntityType) {
        match result {
            Err(HavenError::Storage(StorageError::NotFound {
                entity_type: et, ..
            })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &HavenResult<T>) {
        match result {
            Err(HavenError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_state_conflict<T: std::fmt::Debug>(result: &HavenResult<T>) {
        match result {
            Err(HavenError::State(_)) => {}
            other => panic!("Expected State error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_duplicate_key<T: std::fmt::Debug>(result: &HavenResult<T>, field: &str) {
        match result {
            Err(HavenError::Storage(StorageError::DuplicateKey { field: f, .. })) => {
                assert_eq!(f, field, "Wrong field in DuplicateKey error");
            }
            other => panic!("Expected DuplicateKey on {}, got: {:?}", field, other),
        }
    }

    #[track_caller]
    pub fn assert_cache_unavailable<T: std::fmt::Debug>(result: &HavenResult<T>) {
        match result {
            Err(HavenError::Cache(CacheError::Unavailable { .. })) => {}
            other => panic!("Expected cache Unavailable error, got: {:?}", other),
        }
    }
}
