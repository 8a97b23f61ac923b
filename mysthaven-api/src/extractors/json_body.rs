//! JSON request body extractor.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Like [`axum::Json`], but malformed or mistyped bodies become a 400
/// [`ApiError`].
///
/// # Example
///
/// ```rust,ignore
/// async fn upsert_sticky(
///     PathKey(channel_id): PathKey,
///     JsonBody(patch): JsonBody<StickyMessagePatch>,
/// ) -> ApiResult<impl IntoResponse> {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => ApiError::validation_failed(e.body_text()),
        JsonRejection::JsonSyntaxError(e) => {
            ApiError::invalid_input(format!("Malformed JSON: {}", e.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::invalid_input("Expected request with `Content-Type: application/json`")
        }
        other => ApiError::invalid_input(other.body_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    use crate::error::ErrorCode;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct StickyBody {
        #[allow(dead_code)]
        message_id: String,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let req = request(Some("application/json"), r#"{"message_id":"m1"}"#);
        assert!(JsonBody::<StickyBody>::from_request(req, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_field_is_validation_error() {
        let req = request(Some("application/json"), r#"{"message_id":"m1","x":1}"#);
        let err = JsonBody::<StickyBody>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_syntax_error_and_missing_content_type() {
        let req = request(Some("application/json"), "{not json");
        let err = JsonBody::<StickyBody>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let req = request(None, r#"{"message_id":"m1"}"#);
        let err = JsonBody::<StickyBody>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
