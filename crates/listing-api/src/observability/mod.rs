//! Observability setup for the API binary.

pub mod metrics;

pub use metrics::init_metrics_recorder;
