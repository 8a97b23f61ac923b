//! Error types for Mysthaven operations

use crate::EntityType;
use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity_type} not found: {key}")]
    NotFound { entity_type: EntityType, key: String },

    #[error("Duplicate key in {collection}: {field} = {value}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Durable store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Malformed document in {collection}: {reason}")]
    MalformedDocument { collection: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Ephemeral cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Validation errors. Raised before any adapter is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn missing(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rejected state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Giveaway {giveaway_id} has already ended")]
    GiveawayEnded { giveaway_id: String },

    #[error("Giveaway {giveaway_id} is still active")]
    GiveawayActive { giveaway_id: String },

    #[error("User {user_id} already joined giveaway {giveaway_id}")]
    AlreadyJoined {
        giveaway_id: String,
        user_id: String,
    },

    #[error("Giveaway {giveaway_id} has {count} participants, need at least {required}")]
    NotEnoughParticipants {
        giveaway_id: String,
        count: usize,
        required: usize,
    },

    #[error("Concurrent modification of {entity_type} {key}")]
    ConcurrentModification { entity_type: EntityType, key: String },
}

/// Master error type for all Mysthaven errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HavenError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl HavenError {
    pub fn not_found(entity_type: EntityType, key: impl Into<String>) -> Self {
        HavenError::Storage(StorageError::NotFound {
            entity_type,
            key: key.into(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HavenError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for Mysthaven operations.
pub type HavenResult<T> = Result<T, HavenError>;

// =============================================================================
// TESTS
// =============================================================================
