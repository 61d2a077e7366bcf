//! Issuer key-set retrieval and caching.
//!
//! The issuer publishes its RSA signing keys as a JSON Web Key Set. The
//! [`JwksCache`] fetches that document on first use and keeps it for the
//! rest of the process lifetime:
//!
//! ```text
//! absent --(first successful fetch)--> populated
//!   ^                                      |
//!   +---- fetch/parse failure (retry) -----+  (only while absent)
//! ```
//!
//! Concurrent cold-start callers are collapsed onto a single in-flight
//! fetch. The first caller holds the fetch lock and later callers wait on
//! it, then share its outcome: the populated cache on success, or the same
//! error on failure. Only a caller arriving after that fetch completed
//! starts a new one.
//!
//! An optional refresh-on-miss policy (see [`KeySetSource::refresh_after_miss`])
//! allows one re-fetch when a token names a key identifier the cached set
//! does not contain and the cached set is older than a minimum age.

use crate::config::AuthConfig;
use crate::error::KeySetError;
use crate::observability::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Algorithm-specific public-key material of a published key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// RSA public key as big-endian unsigned modulus and exponent bytes.
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },

    /// A key type this verifier cannot use. Kept so that a token naming it
    /// is rejected as a signature problem rather than an unknown key.
    Unsupported,
}

/// One published public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    /// Key identifier, unique within a key set.
    pub kid: String,

    /// Key type tag (`"RSA"` for usable keys).
    pub kty: String,

    /// Algorithm the issuer pinned this key to, if published.
    pub alg: Option<String>,

    /// Intended key use (`"sig"`), if published.
    pub key_use: Option<String>,

    /// Decoded key material.
    pub material: KeyMaterial,
}

impl SigningKey {
    /// Returns `true` for RSA keys with usable material.
    pub fn is_rsa(&self) -> bool {
        matches!(self.material, KeyMaterial::Rsa { .. })
    }
}

/// The full published key collection at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

/// Wire format of a single JWK. Every field is optional here so that
/// [`KeySet::from_json`] can report which mandatory field is missing.
#[derive(Debug, Deserialize)]
struct RawJwk {
    #[serde(default)]
    kty: Option<String>,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
}

/// Wire format of the key-set document.
#[derive(Debug, Deserialize)]
struct RawJwks {
    keys: Vec<RawJwk>,
}

impl KeySet {
    /// Build a key set from already-validated keys.
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Parse and validate a key-set document.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::Parse` if the body is not JSON, lacks a `keys`
    /// array, or any entry is missing a mandatory field or carries
    /// undecodable RSA material.
    pub fn from_json(body: &[u8]) -> Result<Self, KeySetError> {
        let raw: RawJwks = serde_json::from_slice(body)
            .map_err(|e| KeySetError::Parse(format!("invalid key set document: {}", e)))?;

        let keys = raw
            .keys
            .into_iter()
            .enumerate()
            .map(|(index, jwk)| parse_jwk(index, jwk))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { keys })
    }

    /// Find the key with the given identifier.
    ///
    /// Keys are scanned in publication order and the first match wins.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn parse_jwk(index: usize, jwk: RawJwk) -> Result<SigningKey, KeySetError> {
    let kid = jwk
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| KeySetError::Parse(format!("key {} is missing 'kid'", index)))?;

    let kty = jwk
        .kty
        .filter(|kty| !kty.is_empty())
        .ok_or_else(|| KeySetError::Parse(format!("key '{}' is missing 'kty'", kid)))?;

    let material = if kty == "RSA" {
        let modulus = decode_unsigned(&kid, "n", jwk.n.as_deref())?;
        let exponent = decode_unsigned(&kid, "e", jwk.e.as_deref())?;
        KeyMaterial::Rsa { modulus, exponent }
    } else {
        KeyMaterial::Unsupported
    };

    Ok(SigningKey {
        kid,
        kty,
        alg: jwk.alg,
        key_use: jwk.key_use,
        material,
    })
}

/// Decode a base64url unsigned integer field. Trailing padding is tolerated.
fn decode_unsigned(kid: &str, field: &str, value: Option<&str>) -> Result<Vec<u8>, KeySetError> {
    let value = value
        .ok_or_else(|| KeySetError::Parse(format!("RSA key '{}' is missing '{}'", kid, field)))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| {
            KeySetError::Parse(format!(
                "RSA key '{}' has invalid '{}' encoding: {}",
                kid, field, e
            ))
        })?;

    if bytes.is_empty() {
        return Err(KeySetError::Parse(format!(
            "RSA key '{}' has empty '{}'",
            kid, field
        )));
    }

    Ok(bytes)
}

/// Source of the issuer's current key set.
///
/// Injected into the verifier so tests can substitute a pre-populated or
/// failing source without touching process-wide state.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Return the current key set, fetching it if not yet cached.
    async fn get_key_set(&self) -> Result<Arc<KeySet>, KeySetError>;

    /// Re-fetch after a key-identifier miss against `observed`.
    ///
    /// Returns `Ok(Some(set))` when a newer set than `observed` is
    /// available, `Ok(None)` when no refresh was performed.
    async fn refresh_after_miss(
        &self,
        observed: &Arc<KeySet>,
        min_age: Duration,
    ) -> Result<Option<Arc<KeySet>>, KeySetError> {
        let _ = (observed, min_age);
        Ok(None)
    }
}

/// Cached key set with the time it was fetched.
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// HTTP key-set source with a populate-once cache.
pub struct JwksCache {
    /// URL of the issuer's key-set document.
    jwks_url: String,

    /// HTTP client for fetching the key set.
    http_client: reqwest::Client,

    /// Per-request timeout for the outbound fetch.
    fetch_timeout: Duration,

    /// Cached key set; `None` until the first successful fetch.
    cache: RwLock<Option<CachedKeySet>>,

    /// Serialises fetches so concurrent misses share one request. Holds the
    /// error of the most recent cold-start fetch, if it failed.
    fetch_lock: Mutex<Option<KeySetError>>,

    /// Completed cold-start fetches; waiters compare it to detect that the
    /// fetch they queued behind has finished.
    fetch_generation: AtomicU64,

    /// Number of outbound fetch attempts, successful or not.
    fetch_count: AtomicU64,
}

impl JwksCache {
    /// Create a cache for the given key-set URL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the issuer's key-set document
    /// * `fetch_timeout` - Upper bound on each outbound fetch
    pub fn new(jwks_url: String, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "listing.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            fetch_timeout,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(None),
            fetch_generation: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Create a cache from verification settings.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwks_url.clone(), config.jwks_fetch_timeout)
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Number of outbound fetch attempts made so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Returns `true` once a key set has been cached.
    pub async fn is_populated(&self) -> bool {
        self.cache.read().await.is_some()
    }

    async fn cached(&self) -> Option<Arc<KeySet>> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.keys))
    }

    async fn store(&self, keys: KeySet) -> Arc<KeySet> {
        let keys = Arc::new(keys);
        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeySet {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        keys
    }

    /// Perform one outbound fetch and parse the body.
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch(&self) -> Result<KeySet, KeySetError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let result = self.fetch_and_parse().await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_fetch(status, start.elapsed());

        match &result {
            Ok(keys) => tracing::info!(
                target: "listing.auth.jwks",
                key_count = keys.len(),
                "Key set fetched"
            ),
            Err(e) => tracing::error!(target: "listing.auth.jwks", error = %e, "Key set fetch failed"),
        }

        result
    }

    async fn fetch_and_parse(&self) -> Result<KeySet, KeySetError> {
        tracing::debug!(target: "listing.auth.jwks", "Fetching key set from issuer");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Fetch(format!("issuer returned HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeySetError::Fetch(format!("failed to read response body: {}", e)))?;

        KeySet::from_json(&body)
    }
}

#[async_trait]
impl KeySetSource for JwksCache {
    #[instrument(skip(self))]
    async fn get_key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
        if let Some(keys) = self.cached().await {
            return Ok(keys);
        }

        let generation = self.fetch_generation.load(Ordering::Acquire);
        let mut last_failure = self.fetch_lock.lock().await;

        // Another caller may have populated the cache while we waited
        if let Some(keys) = self.cached().await {
            tracing::debug!(target: "listing.auth.jwks", "Key set populated by concurrent fetch");
            return Ok(keys);
        }

        // The fetch we queued behind failed; share its outcome
        if self.fetch_generation.load(Ordering::Acquire) != generation {
            if let Some(err) = last_failure.as_ref() {
                tracing::debug!(target: "listing.auth.jwks", "Key set fetch failed for concurrent caller");
                return Err(err.clone());
            }
        }

        let result = self.fetch().await;
        let outcome = match result {
            Ok(keys) => {
                *last_failure = None;
                Ok(self.store(keys).await)
            }
            Err(err) => {
                *last_failure = Some(err.clone());
                Err(err)
            }
        };
        self.fetch_generation.fetch_add(1, Ordering::AcqRel);

        outcome
    }

    #[instrument(skip(self, observed))]
    async fn refresh_after_miss(
        &self,
        observed: &Arc<KeySet>,
        min_age: Duration,
    ) -> Result<Option<Arc<KeySet>>, KeySetError> {
        let _fetch_guard = self.fetch_lock.lock().await;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !Arc::ptr_eq(&cached.keys, observed) {
                    // Already replaced by a concurrent refresh
                    return Ok(Some(Arc::clone(&cached.keys)));
                }
                if cached.fetched_at.elapsed() < min_age {
                    tracing::debug!(target: "listing.auth.jwks", "Key set too fresh to refresh on miss");
                    return Ok(None);
                }
            }
        }

        tracing::info!(target: "listing.auth.jwks", "Refreshing key set after key identifier miss");
        let keys = self.fetch().await?;
        Ok(Some(self.store(keys).await))
    }
}

/// Pre-populated key-set source that never performs I/O.
pub struct StaticKeySet {
    keys: Arc<KeySet>,
}

impl StaticKeySet {
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}

#[async_trait]
impl KeySetSource for StaticKeySet {
    async fn get_key_set(&self) -> Result<Arc<KeySet>, KeySetError> {
        Ok(Arc::clone(&self.keys))
    }
}
