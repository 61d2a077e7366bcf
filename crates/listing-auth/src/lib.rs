//! Bearer-token trust verification for the AI Listing backend.
//!
//! Establishes who is calling a protected operation by verifying an
//! issuer-signed JWT against the issuer's published key set, and whether
//! that caller is the single configured administrator.
//!
//! # Components
//!
//! ```text
//! AuthorizationGate --> TokenVerifier --> KeySetSource (JwksCache)
//!   require_identity      verify           get_key_set
//!   require_admin                          refresh_after_miss
//! ```
//!
//! # Modules
//!
//! - `config` - Verification settings from environment
//! - `error` - Verification and key-set error kinds
//! - `jwks` - Key-set parsing and the populate-once cache
//! - `jwt` - Token verification
//! - `gate` - Identity and administrator checks
//! - `observability` - Metrics recording

pub mod config;
pub mod error;
pub mod gate;
pub mod jwks;
pub mod jwt;
pub mod observability;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, KeySetError};
pub use gate::AuthorizationGate;
pub use jwks::{JwksCache, KeyMaterial, KeySet, KeySetSource, SigningKey, StaticKeySet};
pub use jwt::{TokenClaims, TokenVerifier, VerifiedIdentity, MAX_TOKEN_SIZE_BYTES};
