//! Cache-only `username -> userId` log.
//!
//! Entries have no durable backing and never expire.

use std::sync::Arc;

use mysthaven_core::{EntityType, HavenResult, UsernameLogEntry};
use tracing::debug;

use crate::cache::{CacheBackend, CacheKey};

pub struct UsernameLog<C: CacheBackend> {
    cache: Arc<C>,
}

impl<C: CacheBackend> Clone for UsernameLog<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C: CacheBackend> UsernameLog<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    fn key(username: &str) -> CacheKey {
        CacheKey::for_lookup(
            EntityType::UsernameLogEntry,
            &UsernameLogEntry::by_username(username),
        )
    }

    pub async fn get(&self, username: &str) -> HavenResult<Option<UsernameLogEntry>> {
        let user_id = self.cache.get(&Self::key(username)).await?;
        Ok(user_id.map(|user_id| UsernameLogEntry {
            username: username.to_string(),
            user_id,
        }))
    }

    /// The stored value is the bare user id.
    pub async fn set(&self, entry: &UsernameLogEntry) -> HavenResult<()> {
        entry.validate()?;
        self.cache
            .set(&Self::key(&entry.username), entry.user_id.clone())
            .await?;
        debug!(username = %entry.username, user_id = %entry.user_id, "Username logged");
        Ok(())
    }

    /// `true` when an entry was removed.
    pub async fn delete(&self, username: &str) -> HavenResult<bool> {
        Ok(self.cache.del(&Self::key(username)).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use mysthaven_core::{HavenError, ValidationError};

    fn entry(username: &str, user_id: &str) -> UsernameLogEntry {
        UsernameLogEntry {
            username: username.into(),
            user_id: user_id.into(),
        }
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = Arc::new(InMemoryCacheBackend::new());
        let log = UsernameLog::new(Arc::clone(&cache));

        assert_eq!(log.get("bob").await.unwrap(), None);
        log.set(&entry("bob", "42")).await.unwrap();
        assert_eq!(log.get("bob").await.unwrap(), Some(entry("bob", "42")));
        assert_eq!(cache.peek(&log_key("bob")).as_deref(), Some("42"));
        assert_eq!(cache.ttl(&log_key("bob")), Some(None));

        assert!(log.delete("bob").await.unwrap());
        assert!(!log.delete("bob").await.unwrap());
        assert_eq!(log.get("bob").await.unwrap(), None);
    }

    fn log_key(username: &str) -> CacheKey {
        UsernameLog::<InMemoryCacheBackend>::key(username)
    }

    #[tokio::test]
    async fn test_set_requires_both_fields() {
        let log = UsernameLog::new(Arc::new(InMemoryCacheBackend::new()));
        let err = log.set(&entry("bob", "")).await.unwrap_err();
        assert_eq!(
            err,
            HavenError::Validation(ValidationError::missing("userId"))
        );
    }
}
