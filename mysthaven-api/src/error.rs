//! Error Types for Mysthaven API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mysthaven_core::{CacheError, HavenError, StateError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// A unique field is already owned by another record
    EntityAlreadyExists,

    /// Concurrent modification detected
    ConcurrentModification,

    /// Operation conflicts with current state
    StateConflict,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// A backing service is unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists
            | ErrorCode::ConcurrentModification
            | ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::ConcurrentModification => "Concurrent modification detected",
            ErrorCode::StateConflict => "Operation conflicts with current state",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} {} not found", entity_type, id),
        )
    }

    pub fn entity_already_exists(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} with {} already exists", entity_type, id),
        )
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Map the domain error taxonomy onto HTTP.
///
/// Adapter failures are logged in full and reported generically.
impl From<HavenError> for ApiError {
    fn from(err: HavenError) -> Self {
        match err {
            HavenError::Storage(StorageError::NotFound { entity_type, key }) => {
                ApiError::entity_not_found(entity_type.label(), key)
            }
            HavenError::Storage(StorageError::DuplicateKey {
                collection,
                field,
                value,
            }) => ApiError::entity_already_exists(&collection, format!("{} {}", field, value))
                .with_details(serde_json::json!({ "field": field, "value": value })),
            HavenError::Storage(e @ StorageError::Unavailable { .. }) => {
                tracing::error!(error = %e, "Durable store unavailable");
                ApiError::service_unavailable("Durable store unavailable")
            }
            HavenError::Storage(e) => {
                tracing::error!(error = %e, "Durable store error");
                ApiError::from_code(ErrorCode::InternalError)
            }
            HavenError::Cache(e) => {
                tracing::error!(error = %e, "Cache unavailable");
                match e {
                    CacheError::Unavailable { .. } | CacheError::LockPoisoned => {
                        ApiError::service_unavailable("Cache unavailable")
                    }
                    CacheError::Serialization { .. } => {
                        ApiError::from_code(ErrorCode::InternalError)
                    }
                }
            }
            HavenError::Validation(e) => {
                let message = e.to_string();
                match e {
                    ValidationError::RequiredFieldMissing { .. } => {
                        ApiError::new(ErrorCode::MissingField, message)
                    }
                    ValidationError::InvalidValue { .. } => {
                        ApiError::new(ErrorCode::ValidationFailed, message)
                    }
                }
            }
            HavenError::State(e @ StateError::ConcurrentModification { .. }) => {
                ApiError::new(ErrorCode::ConcurrentModification, e.to_string())
            }
            HavenError::State(e) => ApiError::state_conflict(e.to_string()),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON deserialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
