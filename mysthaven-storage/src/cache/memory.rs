//! In-process cache backend.
//!
//! Used for single-node deployments and throughout the test suite. The
//! number of entries is bounded: once full, the least recently used entry is
//! evicted. Expired entries are dropped on access, and writes sweep the whole
//! map for expired entries at most once per sweep interval (and always
//! before an eviction would be needed).

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use mysthaven_core::{CacheError, HavenResult};
use tracing::debug;

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats};

/// Entry bound used by [`InMemoryCacheBackend::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Minimum time between two full expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug)]
struct State {
    entries: LruCache<CacheKey, Entry>,
    last_sweep: Instant,
}

impl State {
    /// Drop every expired entry. Returns how many were removed.
    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.last_sweep = now;
        expired.len()
    }
}

/// LRU-bounded cache with per-entry expiry and operation counters.
#[derive(Debug)]
pub struct InMemoryCacheBackend {
    state: Mutex<State>,
    sweep_interval: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::with_capacity(Self::default_capacity())
    }

    /// Cache holding at most `max_entries` entries.
    pub fn with_capacity(max_entries: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(max_entries),
                last_sweep: Instant::now(),
            }),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn default_capacity() -> NonZeroUsize {
        NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn capacity(&self) -> usize {
        self.lock().map(|state| state.entries.cap().get()).unwrap_or(0)
    }

    /// Number of `set`/`set_ex` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of `del` calls so far.
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Number of live entries pushed out to respect the capacity.
    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Entries physically held, expired or not.
    pub fn stored_len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    /// Whether a live entry exists, without touching the counters or recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock()
            .map(|state| {
                state
                    .entries
                    .peek(key)
                    .is_some_and(|entry| entry.is_live(Instant::now()))
            })
            .unwrap_or(false)
    }

    /// Remaining lifetime of a live entry. `Some(None)` means no expiry.
    pub fn ttl(&self, key: &CacheKey) -> Option<Option<Duration>> {
        let state = self.lock().ok()?;
        let now = Instant::now();
        let entry = state.entries.peek(key).filter(|entry| entry.is_live(now))?;
        Some(entry.expires_at.map(|at| at.saturating_duration_since(now)))
    }

    /// Raw payload of a live entry, without touching the counters or recency.
    pub fn peek(&self, key: &CacheKey) -> Option<String> {
        let state = self.lock().ok()?;
        state
            .entries
            .peek(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CacheError> {
        self.state.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn insert(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> HavenResult<()> {
        let now = Instant::now();
        // A TTL past the representable range never expires.
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));

        let mut state = self.lock()?;
        let full = state.entries.len() >= state.entries.cap().get()
            && !state.entries.contains(key);
        if full || now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            let swept = state.sweep(now);
            if swept > 0 {
                debug!(swept, "Swept expired cache entries");
            }
        }

        if let Some((evicted, _)) = state.entries.push(key.clone(), Entry { value, expires_at }) {
            if &evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %evicted, "Evicted least recently used cache entry");
            }
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> HavenResult<Option<String>> {
        let mut state = self.lock()?;
        let now = Instant::now();
        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.is_live(now), entry.value.clone()));
        let live = match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                state.entries.pop(key);
                None
            }
            None => None,
        };
        match live {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(live)
    }

    async fn set(&self, key: &CacheKey, value: String) -> HavenResult<()> {
        self.insert(key, value, None)
    }

    async fn set_ex(&self, key: &CacheKey, ttl: Duration, value: String) -> HavenResult<()> {
        self.insert(key, value, Some(ttl))
    }

    async fn del(&self, key: &CacheKey) -> HavenResult<u64> {
        let mut state = self.lock()?;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        match state.entries.pop(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> HavenResult<()> {
        self.lock().map(|_| ()).map_err(Into::into)
    }

    async fn stats(&self) -> HavenResult<CacheStats> {
        let state = self.lock()?;
        let now = Instant::now();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: state.entries.iter().filter(|(_, e)| e.is_live(now)).count() as u64,
        })
    }
}
