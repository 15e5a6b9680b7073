//! Common test utilities for integration tests
//!
//! A wiremock server standing in for a Service Layer backend, plus helpers
//! to build configurations pointing at it.

#![allow(dead_code)]

use serde_json::json;
use servicelayer_client::{LoginRetry, ServiceLayerConfig};
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};

pub const BASE_PATH: &str = "/b1s/v1";
pub const DATABASE: &str = "SBO_TEST";
pub const USERNAME: &str = "manager";
pub const PASSWORD: &str = "s3cr3t";

/// Install a test subscriber once so `RUST_LOG` can be used when debugging.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock Service Layer backend
pub struct MockServiceLayer {
    pub server: MockServer,
}

impl MockServiceLayer {
    /// Start a new mock backend
    pub async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL clients should be configured with
    pub fn base_url(&self) -> String {
        format!("{}{}", self.server.uri(), BASE_PATH)
    }

    /// Configuration pointing at this backend, with fast login retries
    pub fn config(&self) -> ServiceLayerConfig {
        ServiceLayerConfig::new(self.base_url(), DATABASE, USERNAME, PASSWORD).with_login_retry(
            LoginRetry {
                attempts: 2,
                delay_ms: 1,
            },
        )
    }

    /// Full path of an endpoint under the base path
    pub fn path(endpoint: &str) -> String {
        format!("{BASE_PATH}/{endpoint}")
    }

    /// Successful login returning the given `Set-Cookie` values, expected `times` times
    pub async fn mock_login(&self, cookies: &[&str], times: u64) {
        Mock::given(method("POST"))
            .and(path(Self::path("Login")))
            .respond_with(login_success(cookies))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Successful login answering only the next call
    pub async fn mock_login_once(&self, cookies: &[&str]) {
        Mock::given(method("POST"))
            .and(path(Self::path("Login")))
            .respond_with(login_success(cookies))
            .up_to_n_times(1)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Rejected login with a Service Layer style error body
    pub async fn mock_login_rejected(&self, message: &str) {
        Mock::given(method("POST"))
            .and(path(Self::path("Login")))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "code": -304,
                    "message": { "lang": "en-us", "value": message }
                }
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Logout endpoint, expected `times` times
    pub async fn mock_logout(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path(Self::path("Logout")))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// All requests received so far
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Number of login calls received so far
    pub async fn login_count(&self) -> usize {
        self.requests()
            .await
            .iter()
            .filter(|r| r.url.path() == Self::path("Login"))
            .count()
    }
}

fn login_success(cookies: &[&str]) -> ResponseTemplate {
    let mut template = ResponseTemplate::new(200).set_body_json(json!({
        "odata.metadata": "$metadata#B1Sessions/@Element",
        "SessionId": "c0ffee00-0000-0000-0000-000000000000",
        "Version": "1000190",
        "SessionTimeout": 30
    }));
    for cookie in cookies {
        template = template.append_header("Set-Cookie", *cookie);
    }
    template
}

/// Cookie header value of a received request, if any
pub fn cookie(request: &Request) -> Option<String> {
    request
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
