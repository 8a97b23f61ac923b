//! Canonical cache keys.
//!
//! Keys can only be built from an entity type plus a natural-key lookup, so
//! every code path that touches a record agrees on where it lives. The
//! layouts are those of the existing deployment, which keeps a warm cache
//! readable across the migration.

use mysthaven_core::{EntityType, Lookup};
use std::fmt;

/// Key of the aggregate list of active giveaways.
const ACTIVE_GIVEAWAYS: &str = "giveaways:active";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of the record `lookup` selects.
    pub fn for_lookup(entity_type: EntityType, lookup: &Lookup) -> Self {
        let prefix = match entity_type {
            EntityType::ProgressionUser => "rxuser",
            EntityType::MessageTallyUser => "mtuser",
            EntityType::Channel if lookup.field() == "userId" => "channel:user",
            EntityType::Channel => "channel:id",
            EntityType::StickyMessage => "sticky",
            EntityType::BoostedArenaList => "boosted-arena",
            EntityType::ChannelCooldown => "cooldown:channel",
            EntityType::UsernameLogEntry => "ttLog",
            EntityType::Giveaway => "giveaway",
        };
        Self(format!("{}:{}", prefix, lookup.value()))
    }

    pub fn active_giveaways() -> Self {
        Self(ACTIVE_GIVEAWAYS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte form used by binary key-value backends.
    pub fn encode(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
