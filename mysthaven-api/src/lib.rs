//! Mysthaven API - HTTP surface of the cache-aside persistence service
//!
//! Exposes the bot's auxiliary state (progression, message tallies, channel
//! bindings, sticky messages, boosted arena lists, cooldowns, the username
//! log and giveaways) over a small REST API. Every read goes through the
//! cache first; every write commits to the durable store before the cache is
//! refreshed.

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use mysthaven_core::SystemClock;
use mysthaven_storage::{
    ensure_indexes, InMemoryCacheBackend, InMemoryDocumentStore, LmdbCacheBackend,
    MongoDocumentStore, RandomSelector,
};

pub use config::{CacheBackendKind, ConfigError, LogFormat, ServiceConfig, StoreBackendKind};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::{Access, AppState, SharedCache, SharedStore};

/// Open the configured cache adapter.
pub fn connect_cache(kind: &CacheBackendKind) -> ApiResult<SharedCache> {
    match kind {
        CacheBackendKind::Memory { max_entries } => {
            Ok(Arc::new(InMemoryCacheBackend::with_capacity(*max_entries)))
        }
        CacheBackendKind::Lmdb { path, max_size_mb } => {
            let backend = LmdbCacheBackend::new(path, *max_size_mb).map_err(|e| {
                ApiError::service_unavailable(format!("Failed to open LMDB cache: {}", e))
            })?;
            Ok(Arc::new(backend))
        }
    }
}

/// Connect the configured durable store and declare its unique indexes.
pub async fn connect_store(kind: &StoreBackendKind) -> ApiResult<SharedStore> {
    let store: SharedStore = match kind {
        StoreBackendKind::Memory => Arc::new(InMemoryDocumentStore::new()),
        StoreBackendKind::Mongo { uri, database } => {
            Arc::new(MongoDocumentStore::connect(uri, database).await?)
        }
    };
    ensure_indexes(store.as_ref()).await?;
    Ok(store)
}

/// Build the application state for a production process: wall clock and a
/// thread-RNG winner selector.
pub async fn build_state(config: &ServiceConfig) -> ApiResult<AppState> {
    let cache = connect_cache(&config.cache_backend)?;
    let store = connect_store(&config.store_backend).await?;
    Ok(AppState::new(
        cache,
        store,
        config.cache.clone(),
        Arc::new(SystemClock),
        Arc::new(RandomSelector),
    ))
}
