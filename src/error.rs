//! Error types for chatrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::relay::UpstreamError;

/// Result type alias for chatrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chatrelay.
///
/// Only failures raised before the response stream is committed are
/// represented here; mid-stream failures are reported in-band as error
/// frames and never surface as a status code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(UpstreamError::TimedOut) => StatusCode::GATEWAY_TIMEOUT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });

        (status, axum::Json(body)).into_response()
    }
}
