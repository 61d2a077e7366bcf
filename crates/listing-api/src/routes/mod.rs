//! HTTP routes.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{require_admin, require_identity};
use axum::{middleware, routing::get, Router};
use listing_auth::{AuthorizationGate, JwksCache, KeySetSource, TokenVerifier};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Upper bound on handling any single request.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Issuer key-set source shared by the verifier and readiness probe.
    pub key_source: Arc<dyn KeySetSource>,

    /// Identity and administrator checks.
    pub gate: Arc<AuthorizationGate>,
}

impl AppState {
    /// Wire the key-set cache, verifier and gate from configuration.
    pub fn from_config(config: Config) -> Self {
        let key_source: Arc<dyn KeySetSource> = Arc::new(JwksCache::from_config(&config.auth));
        Self::with_key_source(config, key_source)
    }

    /// Wire the verifier and gate around an existing key-set source.
    pub fn with_key_source(config: Config, key_source: Arc<dyn KeySetSource>) -> Self {
        let verifier = Arc::new(TokenVerifier::from_config(
            Arc::clone(&key_source),
            &config.auth,
        ));
        let gate = Arc::new(AuthorizationGate::from_config(verifier, &config.auth));

        Self {
            config,
            key_source,
            gate,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Service information - public
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (issuer key set) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Current user endpoint - requires authentication
/// - `/api/v1/admin/me` - Administrator endpoint - requires the administrator
/// - TraceLayer for request logging
/// - 30 second request timeout
/// - Permissive CORS
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Routes for any verified caller
    let identity_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    // Routes for the administrator only
    let admin_routes = Router::new()
        .route("/api/v1/admin/me", get(handlers::get_admin_me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state);

    // Merge routes and apply global middleware layers
    // Each .layer() wraps the ones before it:
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. CorsLayer - Answer preflight requests (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(identity_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(CorsLayer::permissive())
}
