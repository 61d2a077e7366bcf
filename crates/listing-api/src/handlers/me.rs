//! Current user handler.

use axum::{Extension, Json};
use listing_auth::VerifiedIdentity;
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Verified subject.
    pub sub: String,
}

/// Handler for GET /api/v1/me
///
/// Returns the subject of the verified caller.
/// Requires the `require_identity` middleware.
///
/// ```json
/// { "sub": "user_2abc123" }
/// ```
#[instrument(skip_all, name = "listing.handlers.me")]
pub async fn get_me(Extension(identity): Extension<VerifiedIdentity>) -> Json<MeResponse> {
    tracing::debug!(target: "listing.handlers.me", "Returning caller identity");

    Json(MeResponse {
        sub: identity.into_subject(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_me_returns_subject() {
        let Json(response) =
            get_me(Extension(VerifiedIdentity::new("user_alice".to_string()))).await;

        assert_eq!(response.sub, "user_alice");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"sub":"user_alice"}"#
        );
    }
}
