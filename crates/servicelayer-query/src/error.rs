//! Error types for query construction.

use thiserror::Error;

/// Result type for query construction.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Invalid arguments passed to the query builder.
///
/// Every variant is raised synchronously at the call site that received the
/// bad argument; nothing here is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The operator string does not name a supported filter.
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    /// `between` was given something other than exactly two values.
    #[error("the value for the \"between\" operator must be a list of two elements, got {found}")]
    InvalidBetween {
        /// Number of values actually supplied.
        found: usize,
    },

    /// A set operator was given a single value.
    #[error("operator '{operator}' requires a list of values")]
    ExpectedList {
        /// Operator as written by the caller.
        operator: String,
    },

    /// A scalar operator was given a list.
    #[error("operator '{operator}' requires a single value, got a list")]
    ExpectedScalar {
        /// Operator as written by the caller.
        operator: String,
    },

    /// Sort direction other than `asc` or `desc`.
    #[error("invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidDirection(String),
}
