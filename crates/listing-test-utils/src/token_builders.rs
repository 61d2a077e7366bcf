//! Builder patterns for test token claims
//!
//! Provides fluent APIs for creating claim sets and deliberately
//! untrustworthy tokens (unsigned, HMAC-signed).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://issuer.test")
///     .for_user("user_alice")
///     .expires_in(3600)
///     .build();
/// let token = TestKeypair::primary().sign(&claims);
/// ```
pub struct TestTokenBuilder {
    iss: Option<String>,
    sub: Option<String>,
    exp: Option<i64>,
    iat: i64,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a builder for a valid token from `issuer`, expiring in one hour.
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: Some(issuer.to_string()),
            sub: Some("user_test".to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the subject claim entirely
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Override the issuer claim
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Omit the issuer claim entirely
    pub fn without_issuer(mut self) -> Self {
        self.iss = None;
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Omit the expiration claim entirely
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Add an arbitrary extra claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), json!(iss));
        }
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        Value::Object(claims)
    }
}

/// Token with `alg: none` and an empty signature part.
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    let header = json!({"alg": "none", "typ": "JWT", "kid": kid});
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string().as_bytes()),
        URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes())
    )
}

/// Token signed with HS256 using `secret`, naming `kid` in the header.
///
/// Models the algorithm-confusion attack of signing with a public key as
/// an HMAC secret.
pub fn hs256_token(kid: &str, claims: &Value, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("HS256 test token signing should succeed")
}
