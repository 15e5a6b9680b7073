//! # Service Layer Query
//!
//! Typed OData filter expressions and a query builder that compiles them into
//! the `$select` / `$filter` / `$orderby` / `$top` / `$skip` query options
//! understood by session-oriented OData backends.
//!
//! ## Example
//!
//! ```rust
//! use servicelayer_query::{FilterExpr, ODataQuery};
//!
//! let query = ODataQuery::new()
//!     .select(["DocEntry", "CardCode", "DocTotal"])
//!     .where_expr(FilterExpr::between("DocDate", "2024-01-01", "2024-01-31"))
//!     .or_where_expr(FilterExpr::in_set("GroupCode", [100, 102]))
//!     .top(50);
//!
//! let params = query.to_parameters();
//! assert_eq!(
//!     params.get("$filter").unwrap().to_string(),
//!     "(DocDate ge '2024-01-01' and DocDate le '2024-01-31') or \
//!      (GroupCode eq 100 or GroupCode eq 102)"
//! );
//! ```
//!
//! ## Escaping
//!
//! Numbers are embedded bare; every other value is single-quoted with
//! embedded quotes doubled. [`FilterExpr::raw`] is the only way to bypass
//! escaping and must only be fed trusted text.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod filter;
mod literal;
mod query;

pub use error::{QueryError, Result};
pub use filter::{Comparison, FilterExpr, FilterKind, JoinOperator, StringFunction};
pub use literal::{Literal, Operand, escape};
pub use query::{
    FILTER, FilterOperator, ODataQuery, ORDER_BY, ParamValue, QueryParameters, SELECT, SKIP,
    SortDirection, TOP,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{FilterExpr, ODataQuery, QueryError, SortDirection};
}
