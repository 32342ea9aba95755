//! Shared error handling for API endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// API error type with automatic response conversion.
pub enum ApiError {
    Internal(String),
}

impl ApiError {
    /// Log the underlying failure server-side, answer generically.
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Internal server error".into())
    }
}

/// Extension trait for concise error mapping on store results.
pub trait ResultExt<T> {
    fn store_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn store_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(msg, e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Internal(message) = self;
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}
