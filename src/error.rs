//! Error types for vibehub.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::router::Provider;

/// Result type alias for vibehub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vibehub.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{var} not set")]
    MissingApiKey { provider: Provider, var: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned an unreadable body: {0}")]
    InvalidUpstreamBody(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), axum::Json(body)).into_response()
    }
}
