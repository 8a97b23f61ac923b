//! Cache backend trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mysthaven_core::HavenResult;

use super::key::CacheKey;

/// Key-value cache consumed by the access layer.
///
/// Values are opaque serialized payloads. Implementations must be safe for
/// concurrent use; expiry is advisory and may be lazy.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value, or `None` when absent or expired.
    async fn get(&self, key: &CacheKey) -> HavenResult<Option<String>>;

    /// Store a value without expiry.
    async fn set(&self, key: &CacheKey, value: String) -> HavenResult<()>;

    /// Store a value that expires after `ttl`.
    async fn set_ex(&self, key: &CacheKey, ttl: Duration, value: String) -> HavenResult<()>;

    /// Delete a value. Returns the number of entries removed (0 or 1).
    async fn del(&self, key: &CacheKey) -> HavenResult<u64>;

    /// Liveness probe.
    async fn ping(&self) -> HavenResult<()>;

    /// Get cache statistics.
    async fn stats(&self) -> HavenResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including expired entries).
    pub misses: u64,
    /// Number of writes.
    pub writes: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[async_trait]
impl<T: CacheBackend + ?Sized> CacheBackend for Arc<T> {
    async fn get(&self, key: &CacheKey) -> HavenResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &CacheKey, value: String) -> HavenResult<()> {
        (**self).set(key, value).await
    }

    async fn set_ex(&self, key: &CacheKey, ttl: Duration, value: String) -> HavenResult<()> {
        (**self).set_ex(key, ttl, value).await
    }

    async fn del(&self, key: &CacheKey) -> HavenResult<u64> {
        (**self).del(key).await
    }

    async fn ping(&self) -> HavenResult<()> {
        (**self).ping().await
    }

    async fn stats(&self) -> HavenResult<CacheStats> {
        (**self).stats().await
    }
}
