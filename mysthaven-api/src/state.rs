//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use mysthaven_core::Clock;
use mysthaven_storage::{
    CacheAside, CacheBackend, CacheConfig, CooldownPolicy, DocumentStore, GiveawayService,
    UsernameLog, WinnerSelector,
};

use crate::telemetry::MetricsObserver;

/// Cache adapter chosen at startup.
pub type SharedCache = Arc<dyn CacheBackend>;

/// Durable store adapter chosen at startup.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Access layer over whichever adapters were configured.
pub type Access = CacheAside<SharedCache, SharedStore>;

pub type Cooldowns = Arc<CooldownPolicy<SharedCache, SharedStore>>;
pub type Giveaways = Arc<GiveawayService<SharedCache, SharedStore>>;
pub type Usernames = UsernameLog<SharedCache>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub access: Access,
    pub cooldowns: Cooldowns,
    pub giveaways: Giveaways,
    /// Cache-only username log; shares the access layer's cache.
    pub usernames: Usernames,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services over the given adapters. Lookup outcomes are fed
    /// into the Prometheus registry.
    pub fn new(
        cache: SharedCache,
        store: SharedStore,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        selector: Arc<dyn WinnerSelector>,
    ) -> Self {
        let cache = Arc::new(cache);
        let access = CacheAside::new(Arc::clone(&cache), Arc::new(store), config, clock)
            .with_observer(Arc::new(MetricsObserver));

        Self {
            cooldowns: Arc::new(CooldownPolicy::new(access.clone())),
            giveaways: Arc::new(GiveawayService::new(access.clone(), selector)),
            usernames: UsernameLog::new(cache),
            access,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Access, access);
crate::impl_from_ref!(Cooldowns, cooldowns);
crate::impl_from_ref!(Giveaways, giveaways);
crate::impl_from_ref!(Usernames, usernames);
crate::impl_from_ref!(Instant, start_time);
