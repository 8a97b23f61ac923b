//! Request extractors that reject with [`ApiError`](crate::error::ApiError)
//! bodies instead of axum's plain-text rejections.

mod json_body;
mod path_key;

pub use json_body::JsonBody;
pub use path_key::PathKey;
