//! Health check handlers.
//!
//! Provides liveness and readiness probes.

use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
}

/// Liveness probe handler.
///
/// Always returns "OK" while the process is serving requests.
#[instrument(skip_all, name = "listing.health.live")]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Ready once the issuer's signing keys can be obtained. The first
/// successful probe populates the key-set cache.
///
/// ## Responses
///
/// - 200 `{"status": "ready"}`
/// - 503 `{"status": "not_ready"}` when the key set cannot be fetched
#[instrument(skip_all, name = "listing.health.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.key_source.get_key_set().await {
        Ok(_) => (StatusCode::OK, Json(ReadinessResponse { status: "ready" })),
        Err(e) => {
            tracing::warn!(target: "listing.api.health", error = %e, "Readiness check failed: signing keys unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                }),
            )
        }
    }
}
