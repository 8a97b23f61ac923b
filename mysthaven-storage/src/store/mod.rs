//! Durable document store layer.

pub mod memory;
pub mod mongo;
pub mod traits;

pub use memory::InMemoryDocumentStore;
pub use mongo::MongoDocumentStore;
pub use traits::DocumentStore;
