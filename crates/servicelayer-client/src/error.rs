//! Error types for the Service Layer client.

use servicelayer_query::QueryError;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client.
///
/// An expired session is not an error: it is handled by the one-shot
/// renewal in [`ServiceLayerClient`](crate::ServiceLayerClient), and a
/// renewal that still fails shows up as an ordinary 401/403 response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend rejected the login call.
    #[error("Service Layer login failed (slot {slot}, status {status}): {body}")]
    Authentication {
        /// Pool slot that attempted the login.
        slot: usize,
        /// HTTP status returned by the backend.
        status: u16,
        /// Backend response body, verbatim.
        body: String,
    },

    /// Network failure, timeout or other transport error.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server URL or endpoint could not be resolved.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Request body could not be encoded as JSON.
    #[error("failed to encode request body: {0}")]
    Json(#[from] serde_json::Error),

    /// The session store collaborator failed.
    #[error("session store error: {0}")]
    Store(String),

    /// Invalid query builder arguments.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ClientError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Whether this error came from the backend refusing the credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
