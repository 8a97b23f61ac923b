//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! persistent key-value cache that survives restarts of a single node.
//!
//! # Value Layout
//!
//! `[expires_at_millis: i64 LE][payload]`, where `expires_at_millis == 0`
//! means the entry never expires. Expired or undecodable entries are treated
//! as misses and removed on the next access.
//!
//! # Threading
//!
//! LMDB transactions are blocking, so every operation runs on the blocking
//! pool via `spawn_blocking`. Statistics live behind an `RwLock`.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use mysthaven_core::{CacheError, HavenError, HavenResult};
use tracing::warn;

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats};

const HEADER_LEN: usize = 8;
const NO_EXPIRY: i64 = 0;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored entry is shorter than its header.
    #[error("Corrupt entry for key {0}")]
    Corrupt(String),

    /// Blocking task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for HavenError {
    fn from(e: LmdbCacheError) -> Self {
        HavenError::Cache(CacheError::Unavailable {
            reason: e.to_string(),
        })
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// let backend = LmdbCacheBackend::new("/var/lib/mysthaven/cache", 256)?;
/// backend.set_ex(&key, Duration::from_secs(600), payload).await?;
/// ```
#[derive(Clone)]
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: Arc<RwLock<CacheStats>>,
}

impl LmdbCacheBackend {
    /// Open (or create) a cache under `path` with a map of `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, LmdbCacheError>
    where
        T: Send + 'static,
        F: FnOnce(Env, Database<Bytes, Bytes>) -> Result<T, LmdbCacheError> + Send + 'static,
    {
        let env = self.env.clone();
        let db = self.db;
        tokio::task::spawn_blocking(move || op(env, db))
            .await
            .map_err(|e| LmdbCacheError::Join(e.to_string()))?
    }

    async fn put(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> HavenResult<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Utc::now().timestamp_millis().saturating_add(millis.max(1))
            }
            None => NO_EXPIRY,
        };
        let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
        bytes.extend_from_slice(&expires_at.to_le_bytes());
        bytes.extend_from_slice(value.as_bytes());

        let encoded_key = key.encode();
        self.blocking(move |env, db| {
            let mut wtxn = env.write_txn().map_err(txn_err)?;
            db.put(&mut wtxn, &encoded_key, &bytes).map_err(txn_err)?;
            wtxn.commit().map_err(txn_err)
        })
        .await?;

        self.record(|s| s.writes += 1);
        Ok(())
    }
}

/// Split a stored entry into its expiry and payload.
fn decode(key: &str, bytes: &[u8]) -> Result<(i64, String), LmdbCacheError> {
    if bytes.len() < HEADER_LEN {
        return Err(LmdbCacheError::Corrupt(key.to_string()));
    }
    let header: [u8; HEADER_LEN] = bytes[..HEADER_LEN]
        .try_into()
        .map_err(|_| LmdbCacheError::Corrupt(key.to_string()))?;
    let payload = String::from_utf8(bytes[HEADER_LEN..].to_vec())
        .map_err(|_| LmdbCacheError::Corrupt(key.to_string()))?;
    Ok((i64::from_le_bytes(header), payload))
}

fn is_expired(expires_at: i64, now_millis: i64) -> bool {
    expires_at != NO_EXPIRY && expires_at <= now_millis
}

/// Payload of an entry that decodes and has not expired.
fn live_payload(label: &str, bytes: &[u8], now_millis: i64) -> Option<String> {
    match decode(label, bytes) {
        Ok((expires_at, payload)) if !is_expired(expires_at, now_millis) => Some(payload),
        _ => None,
    }
}

/// Delete an entry seen as expired or undecodable. The entry is read again
/// inside the write transaction, so a value written since the first read is
/// returned instead of deleted.
fn purge_if_stale(
    env: &Env,
    db: Database<Bytes, Bytes>,
    encoded_key: &[u8],
    label: &str,
    now_millis: i64,
) -> Result<Option<String>, LmdbCacheError> {
    let mut wtxn = env.write_txn().map_err(txn_err)?;
    let current = match db.get(&wtxn, encoded_key).map_err(txn_err)? {
        Some(bytes) => Some(live_payload(label, bytes, now_millis)),
        None => None,
    };
    match current {
        Some(Some(payload)) => Ok(Some(payload)),
        Some(None) => {
            db.delete(&mut wtxn, encoded_key).map_err(txn_err)?;
            wtxn.commit().map_err(txn_err)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &CacheKey) -> HavenResult<Option<String>> {
        let encoded_key = key.encode();
        let label = key.to_string();
        let found = self
            .blocking(move |env, db| {
                let stored = {
                    let rtxn = env.read_txn().map_err(txn_err)?;
                    db.get(&rtxn, &encoded_key)
                        .map_err(txn_err)?
                        .map(|bytes| bytes.to_vec())
                };
                let Some(bytes) = stored else {
                    return Ok(None);
                };
                let now_millis = Utc::now().timestamp_millis();
                match decode(&label, &bytes) {
                    Ok((expires_at, payload)) if !is_expired(expires_at, now_millis) => {
                        return Ok(Some(payload))
                    }
                    Ok(_) => {}
                    Err(e) => warn!(key = %label, error = %e, "Purging undecodable cache entry"),
                }
                purge_if_stale(&env, db, &encoded_key, &label, now_millis)
            })
            .await?;

        match found {
            Some(_) => self.record(|s| s.hits += 1),
            None => self.record(|s| s.misses += 1),
        }
        Ok(found)
    }

    async fn set(&self, key: &CacheKey, value: String) -> HavenResult<()> {
        self.put(key, value, None).await
    }

    async fn set_ex(&self, key: &CacheKey, ttl: Duration, value: String) -> HavenResult<()> {
        self.put(key, value, Some(ttl)).await
    }

    async fn del(&self, key: &CacheKey) -> HavenResult<u64> {
        let encoded_key = key.encode();
        let label = key.to_string();
        let removed = self
            .blocking(move |env, db| {
                let mut wtxn = env.write_txn().map_err(txn_err)?;
                let live = match db.get(&wtxn, &encoded_key).map_err(txn_err)? {
                    Some(bytes) => live_payload(&label, bytes, Utc::now().timestamp_millis()).is_some(),
                    None => false,
                };
                db.delete(&mut wtxn, &encoded_key).map_err(txn_err)?;
                wtxn.commit().map_err(txn_err)?;
                Ok(u64::from(live))
            })
            .await?;
        Ok(removed)
    }

    async fn ping(&self) -> HavenResult<()> {
        self.blocking(|env, _| env.read_txn().map(|_| ()).map_err(txn_err))
            .await?;
        Ok(())
    }

    async fn stats(&self) -> HavenResult<CacheStats> {
        let entry_count = self
            .blocking(|env, db| {
                let rtxn = env.read_txn().map_err(txn_err)?;
                db.len(&rtxn).map_err(txn_err)
            })
            .await?;
        let mut stats = self.stats.read().map(|s| s.clone()).unwrap_or_default();
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
