//! Observability for token verification.
//!
//! - `metrics` - Prometheus-style counters and histograms recorded through
//!   the `metrics` facade. The exporter is installed by the binary.

pub mod metrics;

pub use metrics::{record_jwks_fetch, record_token_validation};
