//! API error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Key-set failures are logged server-side and returned to clients as a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use listing_auth::AuthError;
use serde::Serialize;
use thiserror::Error;

/// Message returned when a non-administrator calls an administrator route.
pub const ADMIN_FORBIDDEN_MESSAGE: &str = "You are not authorized to perform admin actions";

/// API error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - KeySetUnavailable: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidToken(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::KeySetUnavailable(_) => 500,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden => ApiError::Forbidden(ADMIN_FORBIDDEN_MESSAGE.to_string()),
            AuthError::KeyResolution(cause) => ApiError::KeySetUnavailable(cause.to_string()),
            other => ApiError::InvalidToken(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            ApiError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            ApiError::KeySetUnavailable(reason) => {
                // Log actual cause server-side, return generic message to client
                tracing::error!(target: "listing.api.auth", reason = %reason, "Signing keys unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "KEY_SET_UNAVAILABLE",
                    "Unable to verify credentials at this time".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"ailisting-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
