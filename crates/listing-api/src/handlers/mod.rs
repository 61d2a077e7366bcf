//! HTTP request handlers.

pub mod admin;
pub mod health;
pub mod me;
pub mod metrics;
pub mod root;

pub use admin::get_admin_me;
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
pub use root::service_info;
