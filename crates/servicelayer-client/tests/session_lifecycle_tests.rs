//! Session lifecycle against a mock Service Layer backend
//!
//! Covers login, cached-session reuse, expiry renewal, the single-retry
//! bound, slot isolation and logout.

mod common;

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{DATABASE, MockServiceLayer, PASSWORD, USERNAME, cookie};
use pretty_assertions::assert_eq;
use serde_json::json;
use servicelayer_client::{
    ClientError, LoginRetry, MemorySessionStore, ServiceLayerClient, ServiceLayerConfig, SessionKey,
    SessionState, SessionStore, StatusCode,
};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

#[tokio::test]
async fn test_login_sends_credentials_and_reassembles_cookies() {
    let backend = MockServiceLayer::start().await;

    Mock::given(method("POST"))
        .and(path(MockServiceLayer::path("Login")))
        .and(body_json(json!({
            "CompanyDB": DATABASE,
            "UserName": USERNAME,
            "Password": PASSWORD,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "B1SESSION=abc-123; path=/b1s/v1; Secure; HttpOnly")
                .append_header("Set-Cookie", "ROUTEID=.node1; path=/b1s"),
        )
        .expect(1)
        .mount(&backend.server)
        .await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Items")))
        .and(header("cookie", "B1SESSION=abc-123; ROUTEID=.node1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let mut client = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .connect()
        .await
        .unwrap();

    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.is_authenticated());
    assert_eq!(
        store.get(client.session_key().as_str()).await.unwrap().as_deref(),
        Some("B1SESSION=abc-123; ROUTEID=.node1")
    );

    let response = client.get("Items").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_warm_store_skips_login() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&["B1SESSION=warm"], 1).await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Items")))
        .and(header("cookie", "B1SESSION=warm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&backend.server)
        .await;

    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

    let mut first = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .build()
        .unwrap();
    assert_eq!(first.state(), SessionState::Unauthenticated);
    first.get("Items").await.unwrap();
    assert_eq!(backend.login_count().await, 1);

    let mut second = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .connect()
        .await
        .unwrap();
    assert_eq!(second.session_key(), first.session_key());
    second.get("Items").await.unwrap();

    assert_eq!(backend.login_count().await, 1);
}

#[tokio::test]
async fn test_expired_session_is_renewed_once() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login_once(&["B1SESSION=first"]).await;
    backend.mock_login_once(&["B1SESSION=second"]).await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Orders")))
        .and(header("cookie", "B1SESSION=first"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&backend.server)
        .await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Orders")))
        .and(header("cookie", "B1SESSION=second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"DocEntry": 1}]})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let mut client = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .connect()
        .await
        .unwrap();

    let response = client.get("Orders").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["value"][0]["DocEntry"], 1);

    // login, rejected call, re-login, replay
    assert_eq!(backend.requests().await.len(), 4);
    assert_eq!(client.state(), SessionState::Authenticated);
    assert_eq!(
        store.get(client.session_key().as_str()).await.unwrap().as_deref(),
        Some("B1SESSION=second")
    );
}

#[tokio::test]
async fn test_forbidden_also_triggers_renewal() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login_once(&["B1SESSION=first"]).await;
    backend.mock_login_once(&["B1SESSION=second"]).await;

    Mock::given(method("PATCH"))
        .and(path(MockServiceLayer::path("Items('A001')")))
        .and(header("cookie", "B1SESSION=first"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&backend.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(MockServiceLayer::path("Items('A001')")))
        .and(header("cookie", "B1SESSION=second"))
        .and(body_json(json!({"ItemName": "Widget"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend.server)
        .await;

    let mut client = ServiceLayerClient::connect(backend.config()).await.unwrap();
    let response = client
        .patch("Items('A001')", &json!({"ItemName": "Widget"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_persistent_rejection_is_bounded() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&["B1SESSION=abc"], 2).await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Items")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid session"))
        .expect(2)
        .mount(&backend.server)
        .await;

    let mut client = ServiceLayerClient::connect(backend.config()).await.unwrap();
    let response = client.get("Items").await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await.unwrap(), "Invalid session");
    assert_eq!(backend.requests().await.len(), 4);
}

#[tokio::test]
async fn test_non_session_errors_are_not_retried() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&["B1SESSION=abc"], 1).await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Items('MISSING')")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&backend.server)
        .await;

    let mut client = ServiceLayerClient::connect(backend.config()).await.unwrap();
    let response = client.get("Items('MISSING')").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(backend.requests().await.len(), 2);
}

#[tokio::test]
async fn test_rejected_login_surfaces_body_and_slot() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login_rejected("Fail to get DB Credentials from SLD").await;

    let err = ServiceLayerClient::builder(backend.config().with_pool_size(3))
        .slot(2)
        .connect()
        .await
        .unwrap_err();

    match err {
        ClientError::Authentication { slot, status, body } => {
            assert_eq!(slot, 2);
            assert_eq!(status, 401);
            assert!(body.contains("Fail to get DB Credentials"));
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

/// One-shot backend answering the login with a 401 whose body is cut short.
fn truncated_login_backend() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        // the login body is a compact JSON object
        while !request.ends_with(b"}") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  Content-Type: application/json\r\n\
                  Content-Length: 512\r\n\r\n\
                  {\"error\"",
            )
            .unwrap();
    });
    format!("http://127.0.0.1:{port}/b1s/v1")
}

#[tokio::test]
async fn test_rejected_login_keeps_body_read_failure() {
    common::init_tracing();
    let config = ServiceLayerConfig::new(truncated_login_backend(), DATABASE, USERNAME, PASSWORD);

    let mut client = ServiceLayerClient::new(config).unwrap();
    match client.login().await.unwrap_err() {
        ClientError::Authentication { status, body, .. } => {
            assert_eq!(status, 401);
            assert!(body.starts_with("failed to read response body: "), "{body}");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_rejected_login_is_not_retried() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login_rejected("bad password").await;

    let mut client = ServiceLayerClient::new(backend.config()).unwrap();
    let err = client.get("Items").await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(client.state(), SessionState::Failed);
    assert_eq!(backend.login_count().await, 1);
}

#[tokio::test]
async fn test_login_without_cookie_is_an_error() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&[], 1).await;

    let err = ServiceLayerClient::connect(backend.config())
        .await
        .unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_unreachable_backend_exhausts_login_retries() {
    // grab a free port and release it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = ServiceLayerConfig::new(
        format!("http://127.0.0.1:{port}/b1s/v1"),
        DATABASE,
        USERNAME,
        PASSWORD,
    )
    .with_login_retry(LoginRetry {
        attempts: 2,
        delay_ms: 1,
    });

    let mut client = ServiceLayerClient::new(config).unwrap();
    let err = client.login().await.unwrap_err();
    assert_eq!(client.state(), SessionState::Failed);
    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_missing_configuration_fails_before_network() {
    let backend = MockServiceLayer::start().await;
    let mut config = backend.config();
    config.database = String::new();

    let err = ServiceLayerClient::connect(config).await.unwrap_err();
    assert!(matches!(err, ClientError::Configuration(ref m) if m.contains("database")));
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn test_new_defers_login_to_first_request() {
    let backend = MockServiceLayer::start().await;

    let client = ServiceLayerClient::new(backend.config()).unwrap();
    assert_eq!(client.state(), SessionState::Unauthenticated);
    assert!(!client.is_authenticated());
    assert!(backend.requests().await.is_empty());
}

/// Store that serves a token but cannot evict it.
#[derive(Debug, Default)]
struct StuckStore {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for StuckStore {
    async fn get(&self, key: &str) -> servicelayer_client::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, token: String, ttl: Duration) -> servicelayer_client::Result<()> {
        self.inner.put(key, token, ttl).await
    }

    async fn forget(&self, _key: &str) -> servicelayer_client::Result<()> {
        Err(ClientError::store("backend unavailable"))
    }
}

#[tokio::test]
async fn test_store_failure_during_renewal_marks_client_failed() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&["B1SESSION=stale"], 1).await;

    Mock::given(method("GET"))
        .and(path(MockServiceLayer::path("Items")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&backend.server)
        .await;

    let mut client = ServiceLayerClient::builder(backend.config())
        .store(Arc::new(StuckStore::default()))
        .connect()
        .await
        .unwrap();

    let err = client.get("Items").await.unwrap_err();
    assert!(matches!(err, ClientError::Store(ref m) if m.contains("backend unavailable")));
    assert_eq!(client.state(), SessionState::Failed);
    assert!(!client.is_authenticated());
    assert_eq!(backend.login_count().await, 1);
}

#[tokio::test]
async fn test_slots_are_isolated_and_logout_is_per_slot() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login_once(&["B1SESSION=slot0"]).await;
    backend.mock_login_once(&["B1SESSION=slot1"]).await;

    Mock::given(method("POST"))
        .and(path(MockServiceLayer::path("Logout")))
        .and(header("cookie", "B1SESSION=slot0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend.server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let config = backend.config().with_pool_size(2);

    let mut zero = ServiceLayerClient::builder(config.clone())
        .store(store.clone())
        .slot(0)
        .connect()
        .await
        .unwrap();
    let one = ServiceLayerClient::builder(config)
        .store(store.clone())
        .slot(1)
        .connect()
        .await
        .unwrap();

    assert_ne!(zero.session_key(), one.session_key());
    assert_eq!(
        zero.session_key(),
        &SessionKey::derive(&backend.base_url(), DATABASE, USERNAME, 0)
    );
    assert_eq!(store.len(), 2);

    zero.logout().await.unwrap();

    assert_eq!(zero.state(), SessionState::Unauthenticated);
    assert!(!store.has(zero.session_key().as_str()).await.unwrap());
    assert_eq!(
        store.get(one.session_key().as_str()).await.unwrap().as_deref(),
        Some("B1SESSION=slot1")
    );
}

#[tokio::test]
async fn test_logout_without_cached_session_is_a_noop() {
    let backend = MockServiceLayer::start().await;
    backend.mock_logout(0).await;

    let mut client = ServiceLayerClient::new(backend.config()).unwrap();
    client.logout().await.unwrap();

    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn test_logout_uses_stored_token_for_fresh_client() {
    let backend = MockServiceLayer::start().await;
    backend.mock_login(&["B1SESSION=shared"], 1).await;

    Mock::given(method("POST"))
        .and(path(MockServiceLayer::path("Logout")))
        .and(header("cookie", "B1SESSION=shared"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend.server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let _owner = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .connect()
        .await
        .unwrap();

    let mut other = ServiceLayerClient::builder(backend.config())
        .store(store.clone())
        .build()
        .unwrap();
    other.logout().await.unwrap();

    assert!(store.is_empty());
    let logout = backend
        .requests()
        .await
        .into_iter()
        .find(|r| r.url.path() == MockServiceLayer::path("Logout"))
        .unwrap();
    assert_eq!(cookie(&logout).as_deref(), Some("B1SESSION=shared"));
}
