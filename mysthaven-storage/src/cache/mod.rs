//! Ephemeral cache layer.
//!
//! The cache only ever holds derived, time-bounded copies of durable records.
//! Keys are built through [`CacheKey`], so a record can only be cached under
//! its canonical location.

pub mod key;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use key::CacheKey;
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory::InMemoryCacheBackend;
pub use traits::{CacheBackend, CacheStats};
