//! Mysthaven Storage - Cache-Aside Persistence
//!
//! Adapters for the ephemeral cache and the durable document store, and the
//! access layer that keeps the two consistent.

pub mod access;
pub mod cache;
pub mod cooldown;
pub mod giveaway;
pub mod records;
pub mod store;
pub mod username_log;

pub use access::{CacheAside, CacheConfig, LookupObserver, LookupOutcome, NoopObserver, Record};

// Re-export adapter types for API integration
pub use cache::{
    CacheBackend, CacheKey, CacheStats, InMemoryCacheBackend, LmdbCacheBackend, LmdbCacheError,
};
pub use store::{DocumentStore, InMemoryDocumentStore, MongoDocumentStore};

pub use cooldown::{CooldownPolicy, CooldownSet};
pub use giveaway::{GiveawayService, RandomSelector, SeededSelector, WinnerSelector};
pub use records::ensure_indexes;
pub use username_log::UsernameLog;
