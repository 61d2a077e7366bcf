//! Error taxonomy for bearer-token verification.
//!
//! Every failure is a distinct variant so the route layer can map each one
//! to its own outcome. Display strings never include token content or
//! subject values.

use thiserror::Error;

/// Failures while obtaining the issuer's published key set.
///
/// In both cases the cache is left unpopulated so a later call may retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeySetError {
    /// Transport failure, timeout, or non-success HTTP status.
    #[error("Key set fetch failed: {0}")]
    Fetch(String),

    /// Response body is not a valid key-set document.
    #[error("Key set parse failed: {0}")]
    Parse(String),
}

/// Verification and authorization failures.
///
/// Mapping at the HTTP boundary:
/// - `Forbidden`: 403
/// - `KeyResolution`: 500 (the verifier's own dependency is unhealthy)
/// - everything else: 401
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is structurally unparsable or missing required header fields.
    #[error("Malformed token")]
    MalformedToken,

    /// The key set could not be fetched or parsed.
    #[error("Key resolution failed: {0}")]
    KeyResolution(#[from] KeySetError),

    /// The header's key identifier is not in the current key set.
    #[error("Unknown signing key")]
    UnknownSigningKey,

    /// Signature did not verify, or the declared algorithm is unusable.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// Issuer claim missing or not equal to the trusted issuer.
    #[error("Untrusted token issuer")]
    InvalidIssuer,

    /// Expiry claim is not in the future.
    #[error("Token has expired")]
    TokenExpired,

    /// Subject claim absent or empty.
    #[error("Token has no subject")]
    MissingSubject,

    /// Verified identity is not permitted to perform the operation.
    #[error("Not authorized")]
    Forbidden,
}

impl AuthError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeyResolution(KeySetError::Fetch(_)) => "key_set_fetch",
            AuthError::KeyResolution(KeySetError::Parse(_)) => "key_set_parse",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingSubject => "missing_subject",
            AuthError::Forbidden => "forbidden",
        }
    }

    /// Returns `true` when the caller is at fault (401/403), `false` when
    /// the key-set dependency is unhealthy.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::KeyResolution(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_set_error_display() {
        let err = KeySetError::Fetch("HTTP 503".to_string());
        assert_eq!(format!("{}", err), "Key set fetch failed: HTTP 503");

        let err = KeySetError::Parse("missing keys".to_string());
        assert_eq!(format!("{}", err), "Key set parse failed: missing keys");
    }

    #[test]
    fn test_key_resolution_wraps_cause() {
        let err: AuthError = KeySetError::Fetch("timeout".to_string()).into();
        assert_eq!(
            err,
            AuthError::KeyResolution(KeySetError::Fetch("timeout".to_string()))
        );
        assert_eq!(
            format!("{}", err),
            "Key resolution failed: Key set fetch failed: timeout"
        );
    }

    #[test]
    fn test_kinds_are_distinct() {
        let all = [
            AuthError::MalformedToken,
            AuthError::KeyResolution(KeySetError::Fetch(String::new())),
            AuthError::KeyResolution(KeySetError::Parse(String::new())),
            AuthError::UnknownSigningKey,
            AuthError::SignatureInvalid,
            AuthError::InvalidIssuer,
            AuthError::TokenExpired,
            AuthError::MissingSubject,
            AuthError::Forbidden,
        ];

        let mut kinds: Vec<&str> = all.iter().map(AuthError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), all.len());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AuthError::MalformedToken.is_client_error());
        assert!(AuthError::TokenExpired.is_client_error());
        assert!(AuthError::Forbidden.is_client_error());
        assert!(
            !AuthError::KeyResolution(KeySetError::Parse("bad".to_string())).is_client_error()
        );
        assert!(
            !AuthError::KeyResolution(KeySetError::Fetch("down".to_string())).is_client_error()
        );
    }
}
