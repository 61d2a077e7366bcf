//! Metrics definitions for token verification.
//!
//! All metrics follow Prometheus naming conventions:
//! - `listing_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `AuthError::kind()` (9 values)

use crate::error::AuthError;
use metrics::{counter, histogram};
use std::time::Duration;

/// Record one outbound key-set fetch.
///
/// Metric: `listing_auth_jwks_fetch_total`, `listing_auth_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("listing_auth_jwks_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("listing_auth_jwks_fetch_total",
        "status" => status
    )
    .increment(1);
}

/// Record the outcome of one token validation.
///
/// Metric: `listing_auth_token_validations_total`
/// Labels: `status`, `error_type`
pub fn record_token_validation<T>(result: &Result<T, AuthError>) {
    let (status, error_type) = match result {
        Ok(_) => ("success", "none"),
        Err(e) => ("error", e.kind()),
    };

    counter!("listing_auth_token_validations_total",
        "status" => status,
        "error_type" => error_type
    )
    .increment(1);
}
