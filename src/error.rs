//! HTTP-facing error type for the burn ban API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::cache::{CacheError, MemoizeError};
use crate::data::BurnBanError;
use crate::server::json_response;

/// Application error type that converts to HTTP responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    /// The upstream burn ban source failed
    #[error("Upstream fetch failed: {0}")]
    Upstream(#[source] BurnBanError),

    /// Fresh data could not be written to the cache
    #[error("Cache write failed: {0}")]
    Cache(#[source] CacheError),
}

impl From<MemoizeError<BurnBanError>> for ApiError {
    fn from(err: MemoizeError<BurnBanError>) -> Self {
        match err {
            MemoizeError::Producer(e) => ApiError::Upstream(e),
            MemoizeError::Cache(e) => ApiError::Cache(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, *msg),
            ApiError::Upstream(e) => {
                error!(error = %e, "Failed to fetch burn ban data");
                (StatusCode::BAD_GATEWAY, "Failed to fetch burn ban data")
            }
            ApiError::Cache(e) => {
                error!(error = %e, "Failed to write burn ban cache");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        json_response(status, &json!({ "error": message }), false)
    }
}
