//! Access error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::grant::GrantError;

/// Why a dashboard request was refused.
///
/// Expected failures carry a fixed message and status and are never logged
/// as server errors; only `GrantError::Internal` is.
#[derive(Debug)]
pub enum AccessError {
    /// The request path names no channel
    MissingChannel,
    /// No grant cookie was presented
    NotAuthenticated,
    /// The grant was presented but did not verify
    Grant(GrantError),
}

impl From<GrantError> for AccessError {
    fn from(e: GrantError) -> Self {
        AccessError::Grant(e)
    }
}

impl AccessError {
    fn status_code(&self) -> StatusCode {
        match self {
            AccessError::MissingChannel => StatusCode::NOT_FOUND,
            AccessError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AccessError::Grant(e) => match e {
                GrantError::InvalidSigningMethod | GrantError::InvalidTokenFormat => {
                    StatusCode::BAD_REQUEST
                }
                GrantError::ExpiredToken
                | GrantError::InvalidToken
                | GrantError::NoChannelAccess
                | GrantError::ExpiredChannelAccess => StatusCode::UNAUTHORIZED,
                GrantError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            AccessError::MissingChannel => "Not Found".into(),
            AccessError::NotAuthenticated => "Unauthorized".into(),
            AccessError::Grant(GrantError::Internal(e)) => {
                error!(error = %e, "Grant verification failed unexpectedly");
                "Internal server error".into()
            }
            AccessError::Grant(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        (self.status_code(), self.message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AccessError::MissingChannel, StatusCode::NOT_FOUND),
            (AccessError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (
                AccessError::Grant(GrantError::InvalidSigningMethod),
                StatusCode::BAD_REQUEST,
            ),
            (
                AccessError::Grant(GrantError::InvalidTokenFormat),
                StatusCode::BAD_REQUEST,
            ),
            (
                AccessError::Grant(GrantError::ExpiredToken),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AccessError::Grant(GrantError::InvalidToken),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AccessError::Grant(GrantError::NoChannelAccess),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AccessError::Grant(GrantError::ExpiredChannelAccess),
                StatusCode::UNAUTHORIZED,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
        }
    }
}
