//! Token verifier integration tests.
//!
//! Signs real RS256 tokens with fixed test keys and verifies them against a
//! key set served by a mocked issuer.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use listing_auth::{
    AuthError, JwksCache, KeySet, KeySetError, KeySetSource, StaticKeySet, TokenVerifier,
    MAX_TOKEN_SIZE_BYTES,
};
use listing_test_utils::{
    hs256_token, jwks_json, unsigned_token, MockIssuer, TestKeypair, TestTokenBuilder,
    PRIMARY_KID,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Verifier backed by a live cache against the mock issuer.
fn verifier_for(issuer: &MockIssuer) -> (Arc<JwksCache>, TokenVerifier) {
    let cache = Arc::new(JwksCache::new(issuer.jwks_url(), Duration::from_secs(5)));
    let verifier = TokenVerifier::new(cache.clone(), issuer.issuer());
    (cache, verifier)
}

/// Mock issuer publishing the primary key, expecting `calls` fetches.
async fn issuer_with_primary(calls: u64) -> MockIssuer {
    let issuer = MockIssuer::start().await;
    issuer
        .mount_jwks(jwks_json(&[&TestKeypair::primary()]), calls)
        .await;
    issuer
}

/// Key-set source that always fails with the given error.
struct FailingSource(KeySetError);

#[async_trait]
impl KeySetSource for FailingSource {
    async fn get_key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
        Err(self.0.clone())
    }
}

// =============================================================================
// Accepted tokens
// =============================================================================

#[tokio::test]
async fn test_valid_token_returns_subject() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary().sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .for_user("user_alice")
            .build(),
    );

    let identity = verifier.verify(&token).await?;
    assert_eq!(identity.subject(), "user_alice");

    Ok(())
}

#[tokio::test]
async fn test_key_set_fetched_once_across_verifications() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (cache, verifier) = verifier_for(&issuer);
    let keypair = TestKeypair::primary();

    for user in ["user_a", "user_b", "user_c"] {
        let token = keypair.sign(&TestTokenBuilder::new(&issuer.issuer()).for_user(user).build());
        assert_eq!(verifier.verify(&token).await?.subject(), user);
    }

    assert_eq!(cache.fetch_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_audience_and_extra_claims_are_ignored() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary().sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .for_user("user_alice")
            .with_claim("aud", json!("some-other-service"))
            .with_claim("azp", json!("https://app.test"))
            .with_claim("sid", json!("sess_123"))
            .build(),
    );

    assert!(verifier.verify(&token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_token_without_expiry_is_accepted() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token =
        TestKeypair::primary().sign(&TestTokenBuilder::new(&issuer.issuer()).without_expiry().build());

    assert!(verifier.verify(&token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_rs512_token_with_unpinned_key_is_accepted() -> Result<()> {
    let issuer = MockIssuer::start().await;
    let keypair = TestKeypair::primary();
    issuer
        .mount_jwks(json!({"keys": [keypair.jwk_with_alg(None)]}), 1)
        .await;
    let (_, verifier) = verifier_for(&issuer);

    let token = keypair.sign_with(
        Algorithm::RS512,
        &TestTokenBuilder::new(&issuer.issuer()).for_user("user_alice").build(),
    );

    assert_eq!(verifier.verify(&token).await?.subject(), "user_alice");

    Ok(())
}

// =============================================================================
// Structural rejection
// =============================================================================

#[tokio::test]
async fn test_malformed_tokens_rejected_without_fetch() -> Result<()> {
    let issuer = issuer_with_primary(0).await;
    let (cache, verifier) = verifier_for(&issuer);

    for token in ["", "garbage", "a.b", "a.b.c.d", "!!!.payload.signature"] {
        assert_eq!(
            verifier.verify(token).await,
            Err(AuthError::MalformedToken),
            "token {:?} should be malformed",
            token
        );
    }

    assert_eq!(cache.fetch_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_token_without_kid_is_malformed() -> Result<()> {
    let issuer = issuer_with_primary(0).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary()
        .sign_without_kid(&TestTokenBuilder::new(&issuer.issuer()).build());

    assert_eq!(verifier.verify(&token).await, Err(AuthError::MalformedToken));

    Ok(())
}

#[tokio::test]
async fn test_oversized_token_is_malformed() -> Result<()> {
    let issuer = issuer_with_primary(0).await;
    let (_, verifier) = verifier_for(&issuer);

    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "RS256", "kid": PRIMARY_KID}).to_string());
    let token = format!(
        "{}.{}.sig",
        header,
        "a".repeat(MAX_TOKEN_SIZE_BYTES)
    );

    assert_eq!(verifier.verify(&token).await, Err(AuthError::MalformedToken));

    Ok(())
}

// =============================================================================
// Key resolution
// =============================================================================

#[tokio::test]
async fn test_unknown_kid_rejected_without_refetch() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (cache, verifier) = verifier_for(&issuer);

    let rotated = TestKeypair::primary().with_kid("ins_rotated_key");
    let token = rotated.sign(&TestTokenBuilder::new(&issuer.issuer()).build());

    assert_eq!(verifier.verify(&token).await, Err(AuthError::UnknownSigningKey));
    assert_eq!(verifier.verify(&token).await, Err(AuthError::UnknownSigningKey));
    assert_eq!(cache.fetch_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_found_after_refresh_on_miss() -> Result<()> {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    let secondary = TestKeypair::secondary();
    issuer.mount_jwks_times(jwks_json(&[&primary]), 1).await;
    issuer
        .mount_jwks(jwks_json(&[&primary, &secondary]), 1)
        .await;

    let cache = Arc::new(JwksCache::new(issuer.jwks_url(), Duration::from_secs(5)));
    let verifier =
        TokenVerifier::new(cache.clone(), issuer.issuer()).with_refresh_on_miss(Duration::ZERO);

    let first = primary.sign(&TestTokenBuilder::new(&issuer.issuer()).for_user("user_a").build());
    assert!(verifier.verify(&first).await.is_ok());

    let rotated =
        secondary.sign(&TestTokenBuilder::new(&issuer.issuer()).for_user("user_b").build());
    assert_eq!(verifier.verify(&rotated).await?.subject(), "user_b");
    assert_eq!(cache.fetch_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_refresh_on_miss_failure_reports_unknown_key() -> Result<()> {
    let issuer = MockIssuer::start().await;
    let primary = TestKeypair::primary();
    issuer.mount_jwks_times(jwks_json(&[&primary]), 1).await;
    issuer.mount_status(503, 1).await;

    let cache = Arc::new(JwksCache::new(issuer.jwks_url(), Duration::from_secs(5)));
    let verifier =
        TokenVerifier::new(cache.clone(), issuer.issuer()).with_refresh_on_miss(Duration::ZERO);

    assert!(cache.get_key_set().await.is_ok());

    let token = TestKeypair::secondary().sign(&TestTokenBuilder::new(&issuer.issuer()).build());
    assert_eq!(verifier.verify(&token).await, Err(AuthError::UnknownSigningKey));

    // The original set still verifies
    let valid = primary.sign(&TestTokenBuilder::new(&issuer.issuer()).build());
    assert!(verifier.verify(&valid).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_key_set_fetch_failure_is_key_resolution() -> Result<()> {
    let issuer = MockIssuer::start().await;
    issuer.mount_status(503, 1).await;
    issuer
        .mount_jwks(jwks_json(&[&TestKeypair::primary()]), 1)
        .await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary().sign(&TestTokenBuilder::new(&issuer.issuer()).build());

    let result = verifier.verify(&token).await;
    assert!(matches!(
        result,
        Err(AuthError::KeyResolution(KeySetError::Fetch(_)))
    ));

    // Next request retries and succeeds
    assert!(verifier.verify(&token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_key_set_parse_failure_is_key_resolution() {
    let verifier = TokenVerifier::new(
        Arc::new(FailingSource(KeySetError::Parse("bad document".to_string()))),
        "https://issuer.test".to_string(),
    );

    let token = TestKeypair::primary().sign(&TestTokenBuilder::new("https://issuer.test").build());

    assert_eq!(
        verifier.verify(&token).await,
        Err(AuthError::KeyResolution(KeySetError::Parse(
            "bad document".to_string()
        )))
    );
}

// =============================================================================
// Signature rejection
// =============================================================================

#[tokio::test]
async fn test_token_signed_by_other_key_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    // Secondary private key claiming to be the primary key
    let forged = TestKeypair::secondary().with_kid(PRIMARY_KID);
    let token = forged.sign(&TestTokenBuilder::new(&issuer.issuer()).build());

    assert_eq!(verifier.verify(&token).await, Err(AuthError::SignatureInvalid));

    Ok(())
}

#[tokio::test]
async fn test_unsigned_token_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = unsigned_token(
        PRIMARY_KID,
        &TestTokenBuilder::new(&issuer.issuer()).build(),
    );

    assert_eq!(verifier.verify(&token).await, Err(AuthError::SignatureInvalid));

    Ok(())
}

#[tokio::test]
async fn test_hs256_token_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    // Algorithm confusion: the public modulus used as an HMAC secret
    let primary = TestKeypair::primary();
    let token = hs256_token(
        PRIMARY_KID,
        &TestTokenBuilder::new(&issuer.issuer()).build(),
        primary.modulus_b64.as_bytes(),
    );

    assert_eq!(verifier.verify(&token).await, Err(AuthError::SignatureInvalid));

    Ok(())
}

#[tokio::test]
async fn test_algorithm_not_matching_pinned_key_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary().sign_with(
        Algorithm::RS384,
        &TestTokenBuilder::new(&issuer.issuer()).build(),
    );

    assert_eq!(verifier.verify(&token).await, Err(AuthError::SignatureInvalid));

    Ok(())
}

// =============================================================================
// Claim rejection
// =============================================================================

#[tokio::test]
async fn test_expired_token_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);

    let token = TestKeypair::primary().sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .expires_in(-60)
            .build(),
    );

    assert_eq!(verifier.verify(&token).await, Err(AuthError::TokenExpired));

    Ok(())
}

#[tokio::test]
async fn test_fractional_expiry_is_honoured() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);
    let keypair = TestKeypair::primary();
    let now = chrono::Utc::now().timestamp() as f64;

    let live = keypair.sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .for_user("user_alice")
            .without_expiry()
            .with_claim("exp", json!(now + 3600.5))
            .build(),
    );
    assert_eq!(verifier.verify(&live).await?.subject(), "user_alice");

    let expired = keypair.sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .without_expiry()
            .with_claim("exp", json!(now - 60.5))
            .build(),
    );
    assert_eq!(verifier.verify(&expired).await, Err(AuthError::TokenExpired));

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);
    let keypair = TestKeypair::primary();

    let wrong = keypair.sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .with_issuer("https://evil.example.com")
            .build(),
    );
    assert_eq!(verifier.verify(&wrong).await, Err(AuthError::InvalidIssuer));

    let trailing_slash = keypair.sign(
        &TestTokenBuilder::new(&issuer.issuer())
            .with_issuer(&format!("{}/", issuer.issuer()))
            .build(),
    );
    assert_eq!(
        verifier.verify(&trailing_slash).await,
        Err(AuthError::InvalidIssuer)
    );

    let missing =
        keypair.sign(&TestTokenBuilder::new(&issuer.issuer()).without_issuer().build());
    assert_eq!(verifier.verify(&missing).await, Err(AuthError::InvalidIssuer));

    Ok(())
}

#[tokio::test]
async fn test_missing_subject_rejected() -> Result<()> {
    let issuer = issuer_with_primary(1).await;
    let (_, verifier) = verifier_for(&issuer);
    let keypair = TestKeypair::primary();

    let missing =
        keypair.sign(&TestTokenBuilder::new(&issuer.issuer()).without_subject().build());
    assert_eq!(verifier.verify(&missing).await, Err(AuthError::MissingSubject));

    let empty = keypair.sign(&TestTokenBuilder::new(&issuer.issuer()).for_user("").build());
    assert_eq!(verifier.verify(&empty).await, Err(AuthError::MissingSubject));

    Ok(())
}

#[tokio::test]
async fn test_static_source_verifies_without_network() -> Result<()> {
    let keypair = TestKeypair::primary();
    let key_set = KeySet::from_json(jwks_json(&[&keypair]).to_string().as_bytes())?;
    let verifier = TokenVerifier::new(
        Arc::new(StaticKeySet::new(key_set)),
        "https://issuer.test".to_string(),
    );

    let token = keypair.sign(
        &TestTokenBuilder::new("https://issuer.test")
            .for_user("user_alice")
            .build(),
    );

    assert_eq!(verifier.verify(&token).await?.subject(), "user_alice");

    Ok(())
}
