//! Bearer-token verification.
//!
//! Validates issuer-signed JWTs against the issuer's published RSA keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256/RS384/RS512 are accepted; `alg: none` never verifies
//! - The header algorithm must match the algorithm the key was published for
//! - Issuer is matched exactly; audience is not checked
//! - Token content and subject values are never logged

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwks::{KeyMaterial, KeySet, KeySetSource, SigningKey};
use crate::observability::metrics;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Maximum allowed token size in bytes (8KB).
///
/// Larger tokens are rejected before any base64 decoding or signature work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Fields read from the token's unprotected header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenHeader {
    pub(crate) kid: String,
    pub(crate) alg: String,
}

/// Claims decoded from a signature-verified payload.
///
/// All fields are optional at decode time so that each missing claim maps
/// to its own error kind during validation.
#[derive(Clone, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Subject - redacted in Debug output.
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    ///
    /// Fractional NumericDate values are rounded down to the whole second.
    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub exp: Option<i64>,
}

/// Accept integer or fractional NumericDate values.
fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|seconds| seconds.floor() as i64))
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .finish()
    }
}

/// The result of a successful verification: the token's subject.
///
/// No other claims are retained. The subject is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    subject: String,
}

impl VerifiedIdentity {
    pub fn new(subject: String) -> Self {
        Self { subject }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn into_subject(self) -> String {
        self.subject
    }
}

impl fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("subject", &"[REDACTED]")
            .finish()
    }
}

/// Verifies bearer tokens against the issuer's key set.
pub struct TokenVerifier {
    /// Source of the issuer's signing keys.
    key_source: Arc<dyn KeySetSource>,

    /// Trusted issuer; `iss` must equal this exactly.
    issuer: String,

    /// Minimum key-set age before an unknown `kid` triggers one re-fetch.
    refresh_on_miss: Option<Duration>,
}

impl TokenVerifier {
    /// Create a verifier with the populate-once key policy.
    ///
    /// # Arguments
    ///
    /// * `key_source` - Where signing keys come from
    /// * `issuer` - Trusted issuer string
    pub fn new(key_source: Arc<dyn KeySetSource>, issuer: String) -> Self {
        Self {
            key_source,
            issuer,
            refresh_on_miss: None,
        }
    }

    /// Enable one re-fetch of the key set when a token names an unknown
    /// key identifier and the cached set is at least `min_age` old.
    pub fn with_refresh_on_miss(mut self, min_age: Duration) -> Self {
        self.refresh_on_miss = Some(min_age);
        self
    }

    /// Create a verifier from verification settings.
    pub fn from_config(key_source: Arc<dyn KeySetSource>, config: &AuthConfig) -> Self {
        Self {
            key_source,
            issuer: config.issuer.clone(),
            refresh_on_miss: config.jwks_refresh_on_miss,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a raw bearer token and return the caller's identity.
    ///
    /// # Checks, in order
    ///
    /// 1. Size and structure; extract `kid` and `alg` from the header
    /// 2. Obtain the key set
    /// 3. Find the key named by `kid`
    /// 4. Verify the signature with the header algorithm
    /// 5. Validate `iss`, `exp` and `sub`
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a distinct `AuthError` kind.
    #[instrument(skip_all)]
    pub async fn verify(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let result = self.verify_at(raw_token, now).await;

        metrics::record_token_validation(&result);
        match &result {
            Ok(_) => tracing::debug!(target: "listing.auth.jwt", "Token validated successfully"),
            Err(e) => {
                tracing::debug!(target: "listing.auth.jwt", error_type = e.kind(), "Token rejected")
            }
        }

        result
    }

    async fn verify_at(&self, raw_token: &str, now: i64) -> Result<VerifiedIdentity, AuthError> {
        // 1. Header (unverified)
        let header = parse_header(raw_token)?;

        // 2. Key set
        let key_set = self.key_source.get_key_set().await?;

        // 3. Matching key
        let key = self.resolve_key(&header.kid, key_set).await?;

        // 4. Signature
        let claims = verify_signature(raw_token, &header, &key)?;

        // 5. Claims
        let subject = validate_claims_at(&claims, &self.issuer, now)?;

        Ok(VerifiedIdentity::new(subject))
    }

    async fn resolve_key(&self, kid: &str, key_set: Arc<KeySet>) -> Result<SigningKey, AuthError> {
        if let Some(key) = key_set.find(kid) {
            return Ok(key.clone());
        }

        if let Some(min_age) = self.refresh_on_miss {
            match self.key_source.refresh_after_miss(&key_set, min_age).await {
                Ok(Some(refreshed)) => {
                    if let Some(key) = refreshed.find(kid) {
                        tracing::info!(target: "listing.auth.jwt", kid = %kid, "Key found after key set refresh");
                        return Ok(key.clone());
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // The previously cached set stays in place
                    tracing::warn!(target: "listing.auth.jwt", error = %e, "Key set refresh after miss failed");
                }
            }
        }

        tracing::debug!(target: "listing.auth.jwt", kid = %kid, "Key identifier not found in key set");
        Err(AuthError::UnknownSigningKey)
    }
}

/// Extract `kid` and `alg` from the token header without verifying anything.
pub(crate) fn parse_header(token: &str) -> Result<TokenHeader, AuthError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "listing.auth.jwt",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::MalformedToken);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(target: "listing.auth.jwt", parts = parts.len(), "Token rejected: invalid JWT format");
        return Err(AuthError::MalformedToken);
    }

    let header_part = parts.first().ok_or(AuthError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "listing.auth.jwt", error = %e, "Failed to decode JWT header base64");
        AuthError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "listing.auth.jwt", error = %e, "Failed to parse JWT header JSON");
        AuthError::MalformedToken
    })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(AuthError::MalformedToken)?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or(AuthError::MalformedToken)?;

    Ok(TokenHeader { kid, alg })
}

/// Map a header algorithm name to an accepted RSA algorithm.
///
/// `none` and every non-RSA algorithm are rejected.
fn rsa_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => {
            if other.eq_ignore_ascii_case("none") {
                tracing::warn!(target: "listing.auth.jwt", "Unsigned token rejected");
            } else {
                tracing::debug!(target: "listing.auth.jwt", alg = %other, "Unsupported token algorithm");
            }
            Err(AuthError::SignatureInvalid)
        }
    }
}

/// Verify the signature with `key` and decode the payload claims.
fn verify_signature(
    token: &str,
    header: &TokenHeader,
    key: &SigningKey,
) -> Result<TokenClaims, AuthError> {
    let algorithm = rsa_algorithm(&header.alg)?;

    let (modulus, exponent) = match &key.material {
        KeyMaterial::Rsa { modulus, exponent } => (modulus, exponent),
        KeyMaterial::Unsupported => {
            tracing::warn!(target: "listing.auth.jwt", kid = %key.kid, kty = %key.kty, "Token names a non-RSA key");
            return Err(AuthError::SignatureInvalid);
        }
    };

    if let Some(key_alg) = &key.alg {
        if key_alg != &header.alg {
            tracing::warn!(
                target: "listing.auth.jwt",
                kid = %key.kid,
                key_alg = %key_alg,
                token_alg = %header.alg,
                "Token algorithm does not match key algorithm"
            );
            return Err(AuthError::SignatureInvalid);
        }
    }

    let decoding_key = DecodingKey::from_rsa_raw_components(modulus, exponent);

    // Claims are validated separately against an explicit clock
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "listing.auth.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_) => AuthError::SignatureInvalid,
            _ => AuthError::MalformedToken,
        }
    })?;

    Ok(token_data.claims)
}

/// Validate issuer, expiry and subject against an explicit `now`.
///
/// Returns the subject on success.
pub(crate) fn validate_claims_at(
    claims: &TokenClaims,
    issuer: &str,
    now: i64,
) -> Result<String, AuthError> {
    if claims.iss.as_deref() != Some(issuer) {
        tracing::debug!(target: "listing.auth.jwt", "Token rejected: issuer mismatch");
        return Err(AuthError::InvalidIssuer);
    }

    if let Some(exp) = claims.exp {
        if exp <= now {
            tracing::debug!(target: "listing.auth.jwt", exp = exp, now = now, "Token rejected: expired");
            return Err(AuthError::TokenExpired);
        }
    }

    match &claims.sub {
        Some(sub) if !sub.is_empty() => Ok(sub.clone()),
        _ => Err(AuthError::MissingSubject),
    }
}
