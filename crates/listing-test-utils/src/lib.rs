//! # Listing Test Utilities
//!
//! Shared test utilities for bearer-token verification.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Test claim builders (TestTokenBuilder) and hostile token helpers
//! - A mock token issuer serving a key-set document (MockIssuer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use listing_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let issuer = MockIssuer::start().await;
//!     let keypair = TestKeypair::primary();
//!     issuer.mount_jwks(jwks_json(&[&keypair]), 1).await;
//!
//!     let token = keypair.sign(
//!         &TestTokenBuilder::new(&issuer.issuer())
//!             .for_user("user_alice")
//!             .build(),
//!     );
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_issuer;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_issuer::*;
pub use token_builders::*;
