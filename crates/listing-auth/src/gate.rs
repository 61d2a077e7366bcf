//! Identity and administrator checks for protected operations.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwt::{TokenVerifier, VerifiedIdentity};
use std::sync::Arc;
use tracing::instrument;

/// Guards protected operations behind a verified identity.
///
/// Holds the single configured administrator subject. Administrator status
/// is an exact string comparison; there are no roles or groups.
pub struct AuthorizationGate {
    verifier: Arc<TokenVerifier>,
    admin_subject: String,
}

impl AuthorizationGate {
    pub fn new(verifier: Arc<TokenVerifier>, admin_subject: String) -> Self {
        Self {
            verifier,
            admin_subject,
        }
    }

    pub fn from_config(verifier: Arc<TokenVerifier>, config: &AuthConfig) -> Self {
        Self::new(verifier, config.admin_subject.clone())
    }

    /// Verify the token and return the caller's identity.
    ///
    /// # Errors
    ///
    /// Propagates every verification failure unchanged.
    #[instrument(skip_all)]
    pub async fn require_identity(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.verifier.verify(raw_token).await
    }

    /// Verify the token and require the administrator identity.
    ///
    /// # Errors
    ///
    /// Verification failures propagate unchanged. A valid token whose
    /// subject is not the administrator yields `AuthError::Forbidden`.
    #[instrument(skip_all)]
    pub async fn require_admin(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let identity = self.require_identity(raw_token).await?;

        if !self.is_admin(&identity) {
            tracing::warn!(target: "listing.auth.gate", "Administrator access denied");
            return Err(AuthError::Forbidden);
        }

        tracing::debug!(target: "listing.auth.gate", "Administrator access granted");
        Ok(identity)
    }

    pub fn is_admin(&self, identity: &VerifiedIdentity) -> bool {
        identity.subject() == self.admin_subject
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::jwks::{KeySet, StaticKeySet};

    fn gate(admin: &str) -> AuthorizationGate {
        let verifier = TokenVerifier::new(
            Arc::new(StaticKeySet::new(KeySet::default())),
            "https://issuer.test".to_string(),
        );
        AuthorizationGate::new(Arc::new(verifier), admin.to_string())
    }

    #[test]
    fn test_is_admin_exact_match() {
        let gate = gate("user_admin");

        assert!(gate.is_admin(&VerifiedIdentity::new("user_admin".to_string())));
        assert!(!gate.is_admin(&VerifiedIdentity::new("user_admin2".to_string())));
        assert!(!gate.is_admin(&VerifiedIdentity::new("USER_ADMIN".to_string())));
        assert!(!gate.is_admin(&VerifiedIdentity::new(" user_admin".to_string())));
    }

    #[tokio::test]
    async fn test_require_admin_propagates_verification_failure() {
        let gate = gate("user_admin");

        // Verification fails before the admin comparison is reached
        let result = gate.require_admin("not-a-token").await;
        assert_eq!(result, Err(AuthError::MalformedToken));
    }
}
