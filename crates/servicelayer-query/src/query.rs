//! OData query builder.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::{QueryError, Result};
use crate::filter::{FilterExpr, JoinOperator};
use crate::literal::{Literal, Operand};

/// `$select` wire parameter.
pub const SELECT: &str = "$select";
/// `$filter` wire parameter.
pub const FILTER: &str = "$filter";
/// `$orderby` wire parameter.
pub const ORDER_BY: &str = "$orderby";
/// `$top` wire parameter.
pub const TOP: &str = "$top";
/// `$skip` wire parameter.
pub const SKIP: &str = "$skip";

/// Operators accepted by the string form of `where`.
///
/// Parsing is case-insensitive and accepts both the OData keyword and the
/// symbolic alias (`gt` / `>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// `eq`, `=`
    Equal,
    /// `ne`, `!=`
    NotEqual,
    /// `gt`, `>`
    GreaterThan,
    /// `ge`, `>=`
    GreaterOrEqual,
    /// `lt`, `<`
    LessThan,
    /// `le`, `<=`
    LessOrEqual,
    /// `contains`
    Contains,
    /// `startswith`
    StartsWith,
    /// `endswith`
    EndsWith,
    /// `in`
    In,
    /// `notin`
    NotIn,
    /// `between`
    Between,
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.to_ascii_lowercase().as_str() {
            "=" | "eq" => Self::Equal,
            "!=" | "ne" => Self::NotEqual,
            ">" | "gt" => Self::GreaterThan,
            ">=" | "ge" => Self::GreaterOrEqual,
            "<" | "lt" => Self::LessThan,
            "<=" | "le" => Self::LessOrEqual,
            "contains" => Self::Contains,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "in" => Self::In,
            "notin" => Self::NotIn,
            "between" => Self::Between,
            other => return Err(QueryError::UnsupportedOperator(other.to_string())),
        };
        Ok(op)
    }
}

impl FilterOperator {
    fn name(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessOrEqual => "le",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Between => "between",
        }
    }

    /// Build the expression this operator denotes over `field` and `operand`.
    pub fn build(self, field: impl Into<String>, operand: Operand) -> Result<FilterExpr> {
        let field = field.into();
        match (self, operand) {
            (Self::Between, Operand::List(values)) => match <[Literal; 2]>::try_from(values) {
                Ok([from, to]) => Ok(FilterExpr::between(field, from, to)),
                Err(values) => Err(QueryError::InvalidBetween {
                    found: values.len(),
                }),
            },
            (Self::Between, Operand::Scalar(_)) => Err(QueryError::InvalidBetween { found: 1 }),
            (Self::In, Operand::List(values)) => Ok(FilterExpr::in_set(field, values)),
            (Self::NotIn, Operand::List(values)) => Ok(FilterExpr::not_in_set(field, values)),
            (Self::In | Self::NotIn, Operand::Scalar(_)) => Err(QueryError::ExpectedList {
                operator: self.name().to_string(),
            }),
            (_, Operand::List(_)) => Err(QueryError::ExpectedScalar {
                operator: self.name().to_string(),
            }),
            (Self::Equal, Operand::Scalar(v)) => Ok(FilterExpr::equal(field, v)),
            (Self::NotEqual, Operand::Scalar(v)) => Ok(FilterExpr::not_equal(field, v)),
            (Self::GreaterThan, Operand::Scalar(v)) => Ok(FilterExpr::greater_than(field, v)),
            (Self::GreaterOrEqual, Operand::Scalar(v)) => {
                Ok(FilterExpr::greater_or_equal(field, v))
            }
            (Self::LessThan, Operand::Scalar(v)) => Ok(FilterExpr::less_than(field, v)),
            (Self::LessOrEqual, Operand::Scalar(v)) => Ok(FilterExpr::less_or_equal(field, v)),
            (Self::Contains, Operand::Scalar(v)) => Ok(FilterExpr::contains(field, v)),
            (Self::StartsWith, Operand::Scalar(v)) => Ok(FilterExpr::starts_with(field, v)),
            (Self::EndsWith, Operand::Scalar(v)) => Ok(FilterExpr::ends_with(field, v)),
        }
    }
}

/// Sort direction for `$orderby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending (`asc`).
    #[default]
    Asc,
    /// Descending (`desc`).
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(QueryError::InvalidDirection(s.to_string())),
        }
    }
}

/// Value of a compiled query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// String-valued parameter (`$select`, `$filter`, `$orderby`).
    Text(String),
    /// Integer-valued parameter (`$top`, `$skip`).
    Integer(usize),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Integer(value)
    }
}

/// Ordered mapping of wire parameter name to value.
///
/// Serializes as a map, so it can be handed directly to an HTTP client's
/// query-string encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParameters {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for QueryParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for QueryParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Builder for OData query options.
///
/// ```
/// use servicelayer_query::{ODataQuery, SortDirection};
///
/// let query = ODataQuery::new()
///     .select(["CardCode", "CardName"])
///     .where_eq("CardType", "cCustomer")
///     .where_op("Balance", ">", 1000)?
///     .order_by("CardName", SortDirection::Asc)
///     .top(20);
///
/// let params = query.to_parameters();
/// assert_eq!(
///     params.get("$filter").map(ToString::to_string).as_deref(),
///     Some("CardType eq 'cCustomer' and Balance gt 1000")
/// );
/// # Ok::<(), servicelayer_query::QueryError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataQuery {
    select: Vec<String>,
    filters: Vec<FilterExpr>,
    order_by: Vec<(String, SortDirection)>,
    top: Option<usize>,
    skip: Option<usize>,
}

impl ODataQuery {
    /// Empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selected fields. The last call wins.
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    // An incoming expression may carry a join from another query; the
    // position in this chain decides it.
    fn push(&mut self, mut expr: FilterExpr, join: JoinOperator) {
        let join = if self.filters.is_empty() { None } else { Some(join) };
        expr.set_join_operator(join);
        self.filters.push(expr);
    }

    /// Append a prebuilt expression, joined with `and`.
    #[must_use]
    pub fn where_expr(mut self, expr: FilterExpr) -> Self {
        self.push(expr, JoinOperator::And);
        self
    }

    /// Append `field eq value`, joined with `and`.
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.where_expr(FilterExpr::equal(field, value))
    }

    /// Append `field <op> value`, joined with `and`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when `op` is not a supported operator or the
    /// operand shape does not fit it (for example `between` without exactly
    /// two values).
    pub fn where_op(
        self,
        field: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> Result<Self> {
        let expr = op.parse::<FilterOperator>()?.build(field, value.into())?;
        Ok(self.where_expr(expr))
    }

    /// Append a prebuilt expression, joined with `or`.
    ///
    /// As the first condition this behaves like [`where_expr`](Self::where_expr).
    #[must_use]
    pub fn or_where_expr(mut self, expr: FilterExpr) -> Self {
        self.push(expr, JoinOperator::Or);
        self
    }

    /// Append `field eq value`, joined with `or`.
    #[must_use]
    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.or_where_expr(FilterExpr::equal(field, value))
    }

    /// Append `field <op> value`, joined with `or`.
    ///
    /// # Errors
    ///
    /// Same as [`where_op`](Self::where_op).
    pub fn or_where_op(
        self,
        field: impl Into<String>,
        op: &str,
        value: impl Into<Operand>,
    ) -> Result<Self> {
        let expr = op.parse::<FilterOperator>()?.build(field, value.into())?;
        Ok(self.or_where_expr(expr))
    }

    /// Append an ordering clause. Calls accumulate.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    /// Append an ascending ordering clause.
    #[must_use]
    pub fn order_by_asc(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Asc)
    }

    /// Append a descending ordering clause.
    #[must_use]
    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Desc)
    }

    /// Limit the number of records. Zero is a valid, explicit limit.
    #[must_use]
    pub fn top(mut self, n: usize) -> Self {
        self.top = Some(n);
        self
    }

    /// Skip records. Zero is a valid, explicit offset.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    /// The filter chain in evaluation order.
    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }

    /// Compiled `$filter` value, or `None` when no filter was added.
    pub fn filter_string(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }

        let mut out = String::new();
        for (idx, expr) in self.filters.iter().enumerate() {
            if idx > 0 {
                let join = expr.join_operator().unwrap_or(JoinOperator::And);
                out.push(' ');
                out.push_str(join.as_str());
                out.push(' ');
            }
            out.push_str(&expr.execute());
        }
        Some(out)
    }

    /// Compile to wire parameters, omitting anything unset or empty.
    ///
    /// Pure: calling it repeatedly yields the same result.
    pub fn to_parameters(&self) -> QueryParameters {
        let mut params = QueryParameters::new();

        if !self.select.is_empty() {
            params.insert(SELECT, self.select.join(","));
        }
        if let Some(filter) = self.filter_string() {
            params.insert(FILTER, filter);
        }
        if !self.order_by.is_empty() {
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, dir)| format!("{field} {dir}"))
                .collect();
            params.insert(ORDER_BY, clauses.join(","));
        }
        if let Some(top) = self.top {
            params.insert(TOP, top);
        }
        if let Some(skip) = self.skip {
            params.insert(SKIP, skip);
        }

        params
    }
}

impl From<&ODataQuery> for QueryParameters {
    fn from(query: &ODataQuery) -> Self {
        query.to_parameters()
    }
}

impl From<ODataQuery> for QueryParameters {
    fn from(query: ODataQuery) -> Self {
        query.to_parameters()
    }
}
