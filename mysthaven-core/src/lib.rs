//! Mysthaven Core - Record Types
//!
//! Record schemas, the document model the store adapters speak, and the
//! error taxonomy. No I/O happens in this crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod cooldown;
pub mod document;
pub mod entities;
pub mod enums;
pub mod error;
pub mod giveaway;

pub use cooldown::CooldownStatus;
pub use document::{Condition, Document, Filter, Lookup, Update};
pub use entities::*;
pub use enums::*;
pub use error::*;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new giveaway id (random UUIDv4).
pub fn new_giveaway_id() -> String {
    Uuid::new_v4().to_string()
}

/// Source of the current time, injected wherever expiry is computed.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
