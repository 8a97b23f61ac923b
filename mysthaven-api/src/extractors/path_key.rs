//! Single path-segment key extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;

/// The one path parameter of a route (`/rxuser/:id`, `/ttLog/:username`, ...),
/// trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for PathKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_input(format!(
                    "Invalid path parameter in '{}': {}",
                    parts.uri.path(),
                    e
                ))
            })?;

        let key = raw.trim();
        if key.is_empty() {
            return Err(ApiError::invalid_input("Path parameter must not be empty"));
        }
        Ok(PathKey(key.to_string()))
    }
}
