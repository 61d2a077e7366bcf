//! AIListing API Library
//!
//! HTTP boundary for the AI Listing backend: Bearer-token extraction,
//! identity and administrator gating, and operational endpoints. Token
//! verification itself lives in `listing_auth`.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication middleware
//! - `observability` - Prometheus recorder setup
//! - `routes` - Axum router setup

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
