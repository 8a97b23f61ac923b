//! In-memory document store.
//!
//! Reference implementation of [`DocumentStore`] used by tests and by the
//! `memory` store backend. All operations on a collection happen under one
//! write lock, which gives the same per-document atomicity a real document
//! store provides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use mysthaven_core::{Document, Filter, HavenResult, StorageError, Update};
use serde_json::Value;

use super::traits::DocumentStore;

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl Collection {
    /// Reject `candidate` if it shares a unique value with any document
    /// other than the one at `skip`.
    fn check_unique(
        &self,
        name: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), StorageError> {
        for field in &self.unique_fields {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .enumerate()
                .any(|(idx, doc)| Some(idx) != skip && doc.get(field) == Some(value));
            if clash {
                return Err(StorageError::DuplicateKey {
                    collection: name.to_string(),
                    field: field.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `HashMap`-backed store with unique-index enforcement and I/O counters.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    reads: AtomicU64,
    writes: AtomicU64,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read operations served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of write operations served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Simulate an outage: every operation fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Snapshot of a collection, bypassing the counters.
    pub fn dump(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).map(|c| c.documents.clone()))
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(StorageError::Unavailable {
                reason: "in-memory store is offline".to_string(),
            });
        }
        Ok(())
    }

    fn read<T>(&self, collection: &str, op: impl FnOnce(&[Document]) -> T) -> HavenResult<T> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let collections = self
            .collections
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let docs = collections
            .get(collection)
            .map(|c| c.documents.as_slice())
            .unwrap_or(&[]);
        Ok(op(docs))
    }

    fn write<T>(
        &self,
        collection: &str,
        op: impl FnOnce(&mut Collection) -> Result<T, StorageError>,
    ) -> HavenResult<T> {
        self.check_online()?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let entry = collections.entry(collection.to_string()).or_default();
        Ok(op(entry)?)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> HavenResult<Option<Document>> {
        self.read(collection, |docs| {
            docs.iter().find(|doc| filter.matches(doc)).cloned()
        })
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> HavenResult<Vec<Document>> {
        self.read(collection, |docs| {
            docs.iter().filter(|doc| filter.matches(doc)).cloned().collect()
        })
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> HavenResult<Option<Document>> {
        self.write(collection, |coll| {
            match coll.documents.iter().position(|doc| filter.matches(doc)) {
                Some(idx) => {
                    let mut next = coll.documents[idx].clone();
                    update.apply(&mut next, false);
                    coll.check_unique(collection, &next, Some(idx))?;
                    coll.documents[idx] = next.clone();
                    Ok(Some(next))
                }
                None if upsert => {
                    let mut fresh = Document::new();
                    for (field, value) in filter.equalities() {
                        fresh.insert(field.to_string(), value.clone());
                    }
                    update.apply(&mut fresh, true);
                    coll.check_unique(collection, &fresh, None)?;
                    coll.documents.push(fresh.clone());
                    Ok(Some(fresh))
                }
                None => Ok(None),
            }
        })
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> HavenResult<Option<Document>> {
        self.write(collection, |coll| {
            Ok(coll
                .documents
                .iter()
                .position(|doc| filter.matches(doc))
                .map(|idx| coll.documents.remove(idx)))
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> HavenResult<u64> {
        self.find_one_and_delete(collection, filter)
            .await
            .map(|removed| u64::from(removed.is_some()))
    }

    async fn insert_one(&self, collection: &str, document: Document) -> HavenResult<()> {
        self.write(collection, |coll| {
            coll.check_unique(collection, &document, None)?;
            coll.documents.push(document);
            Ok(())
        })
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> HavenResult<()> {
        self.check_online()?;
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let coll = collections.entry(collection.to_string()).or_default();
        if !coll.unique_fields.iter().any(|f| f == field) {
            coll.unique_fields.push(field.to_string());
        }
        Ok(())
    }

    async fn ping(&self) -> HavenResult<()> {
        self.check_online()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysthaven_core::HavenError;
    use serde_json::json;

    const COLL: &str = "channels";

    #[tokio::test]
    async fn test_upsert_seeds_filter_fields() {
        let store = InMemoryDocumentStore::new();
        let doc = store
            .find_one_and_update(
                COLL,
                &Filter::by("userId", "u1"),
                &Update::new().set("channelId", "c1"),
                true,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["userId"], json!("u1"));
        assert_eq!(doc["channelId"], json!("c1"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_without_upsert_misses() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .find_one_and_update(
                COLL,
                &Filter::by("userId", "ghost"),
                &Update::new().set("channelId", "c1"),
                false,
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.dump(COLL).is_empty());
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let store = InMemoryDocumentStore::new();
        store.ensure_unique_index(COLL, "channelId").await.unwrap();
        store
            .find_one_and_update(
                COLL,
                &Filter::by("userId", "u1"),
                &Update::new().set("channelId", "c1"),
                true,
            )
            .await
            .unwrap();

        let err = store
            .find_one_and_update(
                COLL,
                &Filter::by("userId", "u2"),
                &Update::new().set("channelId", "c1"),
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HavenError::Storage(StorageError::DuplicateKey { ref field, .. }) if field == "channelId"
        ));
        assert_eq!(store.dump(COLL).len(), 1);

        // Re-writing the owner's own value is not a clash.
        store
            .find_one_and_update(
                COLL,
                &Filter::by("userId", "u1"),
                &Update::new().set("channelId", "c1"),
                true,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_one_and_delete() {
        let store = InMemoryDocumentStore::new();
        let mut doc = Document::new();
        doc.insert("userId".into(), json!("u1"));
        store.insert_one(COLL, doc).await.unwrap();

        let removed = store
            .find_one_and_delete(COLL, &Filter::by("userId", "u1"))
            .await
            .unwrap();
        assert!(removed.is_some());
        assert_eq!(
            store.delete_one(COLL, &Filter::by("userId", "u1")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = InMemoryDocumentStore::new();
        store.set_offline(true);
        let err = store.find_one(COLL, &Filter::all()).await.unwrap_err();
        assert!(matches!(
            err,
            HavenError::Storage(StorageError::Unavailable { .. })
        ));
        assert!(store.ping().await.is_err());
    }
}
