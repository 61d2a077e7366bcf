//! Administrator handler.

use axum::{Extension, Json};
use listing_auth::VerifiedIdentity;
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/admin/me`.
#[derive(Debug, Clone, Serialize)]
pub struct AdminMeResponse {
    pub sub: String,
    pub admin: bool,
}

/// Handler for GET /api/v1/admin/me
///
/// Requires the `require_admin` middleware, so reaching this handler means
/// the caller is the administrator.
#[instrument(skip_all, name = "listing.handlers.admin_me")]
pub async fn get_admin_me(
    Extension(identity): Extension<VerifiedIdentity>,
) -> Json<AdminMeResponse> {
    Json(AdminMeResponse {
        sub: identity.into_subject(),
        admin: true,
    })
}
