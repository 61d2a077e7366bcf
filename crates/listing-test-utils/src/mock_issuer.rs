//! Mock token issuer serving a key-set document.

use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock issuer publishes its key set under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A wiremock server standing in for the identity provider.
///
/// Mocks mounted first take precedence; combine `up_to_n_times` failures
/// with a later success to model a recovering issuer.
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer string tokens from this server should carry.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve `jwks` and expect exactly `expected_calls` requests.
    pub async fn mount_jwks(&self, jwks: Value, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `jwks` after `delay`, expecting exactly `expected_calls` requests.
    pub async fn mount_jwks_delayed(&self, jwks: Value, delay: Duration, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks)
                    .set_delay(delay),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `jwks` for at most `times` requests.
    pub async fn mount_jwks_times(&self, jwks: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Respond with `status` for at most `times` requests.
    pub async fn mount_status(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Respond 200 with a raw body, for at most `times` requests.
    pub async fn mount_raw_body(&self, body: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Number of key-set requests received so far.
    pub async fn jwks_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }
}
