//! # Service Layer
//!
//! One-import facade over the Service Layer crates:
//!
//! - [`query`]: typed OData filter expressions and the query builder
//!   (always available).
//! - [`client`]: the session-managing HTTP client with pooled sessions and
//!   transparent renewal (feature `client`, on by default).
//!
//! ## Example
//!
//! ```rust,no_run
//! use servicelayer::prelude::*;
//!
//! # async fn example() -> Result<(), ClientError> {
//! let config = ServiceLayerConfig::new("https://sl:50000/b1s/v1/", "SBO_PROD", "manager", "pw");
//! let mut client = ServiceLayerClient::connect(config).await?;
//!
//! let query = ODataQuery::new()
//!     .where_expr(FilterExpr::greater_than("DocTotal", 1000))
//!     .order_by_desc("DocDate")
//!     .top(25);
//! let orders = client.odata_query("Orders", &query).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub use servicelayer_query as query;

#[cfg(feature = "client")]
pub use servicelayer_client as client;

pub use servicelayer_query::{FilterExpr, ODataQuery, QueryError, SortDirection};

#[cfg(feature = "client")]
pub use servicelayer_client::{
    ClientError, EntityQuery, MemorySessionStore, ServiceLayerClient, ServiceLayerConfig,
    SessionStore,
};

/// Prelude for common imports.
pub mod prelude {
    pub use servicelayer_query::prelude::*;

    #[cfg(feature = "client")]
    pub use servicelayer_client::prelude::*;
}
