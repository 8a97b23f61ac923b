//! Durable document store trait.

use std::sync::Arc;

use async_trait::async_trait;
use mysthaven_core::{Document, Filter, HavenResult, Update};

/// Document store consumed by the access layer.
///
/// Every mutation is atomic per document. Conditional updates (filters with
/// more than the natural key) are how callers guard state transitions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First document matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Filter) -> HavenResult<Option<Document>>;

    /// All documents matching `filter`, in insertion order where the backend
    /// has one.
    async fn find_many(&self, collection: &str, filter: &Filter) -> HavenResult<Vec<Document>>;

    /// Atomically apply `update` to the first document matching `filter` and
    /// return the post-update document.
    ///
    /// With `upsert`, a missing document is created from the filter's
    /// equality conditions and then updated. Without it, `None` is returned
    /// when nothing matches.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> HavenResult<Option<Document>>;

    /// Atomically remove the first matching document and return it.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> HavenResult<Option<Document>>;

    /// Remove the first matching document. Returns the number removed.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> HavenResult<u64>;

    async fn insert_one(&self, collection: &str, document: Document) -> HavenResult<()>;

    /// Declare `field` unique within `collection`. Idempotent.
    async fn ensure_unique_index(&self, collection: &str, field: &str) -> HavenResult<()>;

    /// Liveness probe.
    async fn ping(&self) -> HavenResult<()>;
}

/// Lets a type-erased `Arc<dyn DocumentStore>` stand in wherever a concrete
/// store is expected.
#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn find_one(&self, collection: &str, filter: &Filter) -> HavenResult<Option<Document>> {
        (**self).find_one(collection, filter).await
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> HavenResult<Vec<Document>> {
        (**self).find_many(collection, filter).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> HavenResult<Option<Document>> {
        (**self)
            .find_one_and_update(collection, filter, update, upsert)
            .await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> HavenResult<Option<Document>> {
        (**self).find_one_and_delete(collection, filter).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> HavenResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> HavenResult<()> {
        (**self).insert_one(collection, document).await
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> HavenResult<()> {
        (**self).ensure_unique_index(collection, field).await
    }

    async fn ping(&self) -> HavenResult<()> {
        (**self).ping().await
    }
}
