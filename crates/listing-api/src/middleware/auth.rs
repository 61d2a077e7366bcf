//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, passes it to the
//! authorization gate, and injects the verified identity into request
//! extensions.

use crate::errors::ApiError;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Require any verified identity.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with WWW-Authenticate if the header is missing or the token is invalid
/// - 500 if the issuer's signing keys cannot be obtained
/// - Otherwise continues with `VerifiedIdentity` in extensions
#[instrument(skip_all, name = "listing.middleware.require_identity")]
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(req.headers())?;

    let identity = state.gate.require_identity(token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Require the administrator identity.
///
/// Same as [`require_identity`], plus 403 when the verified subject is not
/// the configured administrator.
#[instrument(skip_all, name = "listing.middleware.require_admin")]
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(req.headers())?;

    let identity = state.gate.require_admin(token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "listing.middleware.auth", "Missing Authorization header");
            ApiError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "listing.middleware.auth", "Invalid Authorization header format");
        ApiError::InvalidToken("Invalid Authorization header format".to_string())
    })
}
