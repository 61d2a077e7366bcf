//! Service information handler.

use axum::Json;
use serde::Serialize;

/// Response for `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Handler for GET /
#[tracing::instrument(skip_all, name = "listing.handlers.root")]
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Welcome to AIListing API",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}
