//! HTTP plumbing: client construction, URL resolution and the login call.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client as HttpClient, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use servicelayer_query::QueryParameters;
use tracing::warn;
use url::Url;

use crate::config::ServiceLayerConfig;
use crate::error::{ClientError, Result};

/// Endpoint that opens a session.
pub const LOGIN_PATH: &str = "Login";

/// Endpoint that closes a session.
pub const LOGOUT_PATH: &str = "Logout";

const JSON: &str = "application/json";

/// Everything but RFC 3986 unreserved characters is escaped, so spaces go
/// out as `%20` and a literal `+` as `%2B`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Body of the login call.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    #[serde(rename = "CompanyDB")]
    pub company_db: &'a str,
    #[serde(rename = "UserName")]
    pub user_name: &'a str,
    #[serde(rename = "Password")]
    pub password: &'a str,
}

impl<'a> LoginRequest<'a> {
    pub(crate) fn from_config(config: &'a ServiceLayerConfig) -> Self {
        Self {
            company_db: &config.database,
            user_name: &config.username,
            password: config.password.expose_secret(),
        }
    }
}

/// Build the shared HTTP client for a configuration.
///
/// # Errors
///
/// Returns [`ClientError::Transport`] if the TLS backend cannot be set up.
pub fn build_http_client(config: &ServiceLayerConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));

    let mut builder = HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout_duration());

    if !config.verify_ssl {
        warn!(
            server = %config.server,
            "TLS certificate verification is disabled. Only use this against \
             backends with self-signed certificates on trusted networks."
        );
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

/// Parse the configured server into a base URL ending in `/`.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUrl`] if the server is not an absolute URL.
pub fn base_url(server: &str) -> Result<Url> {
    let trimmed = server.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    Ok(Url::parse(&normalized)?)
}

/// Resolve an endpoint relative to the base URL.
///
/// A leading `/` is ignored so `"/Items"` and `"Items"` both land under the
/// base path instead of replacing it.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUrl`] if the endpoint cannot be joined.
pub fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url> {
    Ok(base.join(endpoint.trim_start_matches('/'))?)
}

/// Encode compiled parameters as a query string, in insertion order.
pub fn encode_query(params: &QueryParameters) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_COMPONENT),
                utf8_percent_encode(&value.to_string(), QUERY_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Whether a status means the backend no longer accepts the session.
pub fn is_session_expired(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Whether a transport failure is worth another login attempt.
pub(crate) fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Convert a header pair into typed header parts.
pub(crate) fn header_pair(
    name: &str,
    value: &str,
) -> Result<(reqwest::header::HeaderName, HeaderValue)> {
    let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((header_name, header_value))
}
