//! # Service Layer Client
//!
//! Session-managing HTTP client for cookie-authenticated OData backends
//! such as the SAP Business One Service Layer.
//!
//! ## Sessions
//!
//! A [`ServiceLayerClient`] binds to one of `pool_size` session slots for a
//! (server, database, username) identity. Sessions are cached in a
//! [`SessionStore`] under a key derived from that identity and the slot, so
//! short-lived clients sharing a store reuse each other's sessions instead of
//! logging in again.
//!
//! When the backend answers 401 or 403, the client forgets the cached
//! session, logs in again and replays the request once. A second rejection
//! is returned to the caller as an ordinary response.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use servicelayer_client::{MemorySessionStore, ServiceLayerClient, ServiceLayerConfig};
//! use servicelayer_query::{FilterExpr, ODataQuery};
//!
//! # async fn example() -> servicelayer_client::Result<()> {
//! let config = ServiceLayerConfig::from_env()?;
//! let store = Arc::new(MemorySessionStore::new());
//!
//! let mut client = ServiceLayerClient::builder(config)
//!     .store(store)
//!     .connect()
//!     .await?;
//!
//! let query = ODataQuery::new()
//!     .select(["CardCode", "CardName"])
//!     .where_expr(FilterExpr::starts_with("CardCode", "C"))
//!     .top(10);
//! let partners = client.odata_query("BusinessPartners", &query).await?;
//!
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod entity;
mod error;
mod pool;
mod session;
mod slot;
mod store;
mod transport;

pub use client::{ClientBuilder, ServiceLayerClient};
pub use config::{DEFAULT_CACHE_TTL_SECS, DEFAULT_TIMEOUT_SECS, ENV_PREFIX, LoginRetry, ServiceLayerConfig};
pub use entity::EntityQuery;
pub use error::{ClientError, Result};
pub use pool::{PoolKey, PoolResponses, SessionPool};
pub use session::{SessionCredential, SessionState};
pub use slot::select_slot;
pub use store::{MemorySessionStore, SessionKey, SessionStore};
pub use transport::{
    LOGIN_PATH, LOGOUT_PATH, base_url, build_http_client, encode_query, endpoint_url,
    is_session_expired,
};

/// Re-exported so callers can name response and method types without a
/// direct `reqwest` dependency.
pub use reqwest::{Method, Response, StatusCode};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        ClientError, EntityQuery, MemorySessionStore, ServiceLayerClient, ServiceLayerConfig,
        SessionStore,
    };
}
