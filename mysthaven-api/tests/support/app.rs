//! Shared test infrastructure: the full router over in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use mysthaven_api::{create_api_router, AppState, ServiceConfig, SharedCache, SharedStore};
use mysthaven_storage::{ensure_indexes, SeededSelector};
use mysthaven_test_utils::{CacheConfig, Clock, FailingCache, FixedClock, InMemoryDocumentStore};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub cache: Arc<FailingCache>,
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(CacheConfig::default()).await
    }

    pub async fn with_config(config: CacheConfig) -> Self {
        let cache = Arc::new(FailingCache::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(FixedClock::default());
        ensure_indexes(store.as_ref())
            .await
            .expect("in-memory indexes");

        let state = AppState::new(
            Arc::clone(&cache) as SharedCache,
            Arc::clone(&store) as SharedStore,
            config,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(SeededSelector::new(7)),
        );
        let router = create_api_router(state, &ServiceConfig::default());

        Self {
            router,
            cache,
            store,
            clock,
        }
    }

    /// Send one request and decode the JSON body (`Value::Null` when empty or
    /// not JSON).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, None).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    pub async fn delete_with(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(body)).await
    }
}
