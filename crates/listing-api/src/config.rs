//! Service configuration.

use listing_auth::AuthConfig;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub bind_address: String,

    /// Seconds to wait after a shutdown signal before stopping.
    pub drain_seconds: u64,

    /// Token verification settings.
    pub auth: AuthConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Auth(#[from] listing_auth::ConfigError),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth = AuthConfig::from_vars(vars)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let drain_seconds = match vars.get("LISTING_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(
                    "LISTING_DRAIN_SECONDS".to_string(),
                    format!("must be a non-negative integer, got '{}': {}", value_str, e),
                )
            })?,
            None => 0,
        };

        Ok(Config {
            bind_address,
            drain_seconds,
            auth,
        })
    }
}
