//! Token verification configuration.
//!
//! Loaded from environment variables. Nothing here is secret: the issuer,
//! key-set URL and administrator subject are all public identifiers.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default outbound key-set fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound on the key-set fetch timeout.
///
/// Must stay below the HTTP layer's 30 s request timeout so a slow fetch
/// surfaces as a key-set error instead of a request timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 20;

/// Path appended to the issuer when `AUTH_JWKS_URL` is not set.
pub const JWKS_WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// Bearer-token verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Trusted issuer; the `iss` claim must equal this exactly.
    pub issuer: String,

    /// URL of the issuer's published key set.
    pub jwks_url: String,

    /// Subject identifier of the single administrator.
    pub admin_subject: String,

    /// Timeout applied to every outbound key-set fetch.
    pub jwks_fetch_timeout: Duration,

    /// Minimum cache age before an unknown key identifier triggers one
    /// re-fetch. `None` keeps the populate-once behaviour.
    pub jwks_refresh_on_miss: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl AuthConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer = required(vars, "AUTH_ISSUER")?;
        let admin_subject = required(vars, "AUTH_ADMIN_SUBJECT")?;

        let jwks_url = vars
            .get("AUTH_JWKS_URL")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| {
                format!("{}{}", issuer.trim_end_matches('/'), JWKS_WELL_KNOWN_PATH)
            });

        let jwks_fetch_timeout = if let Some(value_str) = vars.get("AUTH_JWKS_FETCH_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(
                    "AUTH_JWKS_FETCH_TIMEOUT_SECONDS".to_string(),
                    format!("must be a valid positive integer, got '{}': {}", value_str, e),
                )
            })?;

            if value == 0 || value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidValue(
                    "AUTH_JWKS_FETCH_TIMEOUT_SECONDS".to_string(),
                    format!(
                        "must be between 1 and {} seconds, got {}",
                        MAX_JWKS_FETCH_TIMEOUT_SECONDS, value
                    ),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS)
        };

        let jwks_refresh_on_miss = match vars.get("AUTH_JWKS_REFRESH_ON_MISS_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidValue(
                        "AUTH_JWKS_REFRESH_ON_MISS_SECONDS".to_string(),
                        format!("must be a valid positive integer, got '{}': {}", value_str, e),
                    )
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidValue(
                        "AUTH_JWKS_REFRESH_ON_MISS_SECONDS".to_string(),
                        "must be greater than 0".to_string(),
                    ));
                }

                Some(Duration::from_secs(value))
            }
            None => None,
        };

        Ok(AuthConfig {
            issuer,
            jwks_url,
            admin_subject,
            jwks_fetch_timeout,
            jwks_refresh_on_miss,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    let value = vars
        .get(name)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;

    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must not be empty".to_string(),
        ));
    }

    Ok(value.clone())
}
