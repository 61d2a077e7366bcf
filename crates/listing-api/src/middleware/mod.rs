//! HTTP middleware.
//!
//! # Components
//!
//! - `auth` - Identity and administrator checks for protected routes

pub mod auth;

pub use auth::{require_admin, require_identity};
