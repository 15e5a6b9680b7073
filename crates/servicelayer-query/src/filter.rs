//! OData filter expressions.
//!
//! A [`FilterExpr`] is one predicate over one field (or a raw fragment)
//! plus the logical operator that joins it to the previous expression in a
//! [`ODataQuery`](crate::ODataQuery) chain. Expressions are immutable once
//! built; only the join operator is assigned, by the query builder, when the
//! expression is appended behind another one.

use std::fmt;

use crate::literal::Literal;

/// Logical connective printed between two adjacent filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOperator {
    /// `and`
    And,
    /// `or`
    Or,
}

impl JoinOperator {
    /// Wire spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for JoinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `eq`
    Equal,
    /// `ne`
    NotEqual,
    /// `gt`
    GreaterThan,
    /// `ge`
    GreaterOrEqual,
    /// `lt`
    LessThan,
    /// `le`
    LessOrEqual,
}

impl Comparison {
    /// Wire spelling of the comparison.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessOrEqual => "le",
        }
    }
}

/// String matching functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFunction {
    /// `contains(field, value)`
    Contains,
    /// `startswith(field, value)`
    StartsWith,
    /// `endswith(field, value)`
    EndsWith,
}

impl StringFunction {
    /// Wire spelling of the function.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
        }
    }
}

/// The predicate carried by a [`FilterExpr`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// `field <op> value`
    Compare {
        /// Backend property name, passed through unvalidated.
        field: String,
        /// Comparison operator.
        op: Comparison,
        /// Right-hand value.
        value: Literal,
    },
    /// `func(field, value)`
    Function {
        /// Backend property name.
        field: String,
        /// Matching function.
        func: StringFunction,
        /// Needle.
        value: Literal,
    },
    /// Inclusive range on one field.
    Between {
        /// Backend property name.
        field: String,
        /// Lower bound.
        from: Literal,
        /// Upper bound.
        to: Literal,
    },
    /// Field equal to any of the values.
    InSet {
        /// Backend property name.
        field: String,
        /// Candidate values, in order.
        values: Vec<Literal>,
    },
    /// Field different from every value.
    NotInSet {
        /// Backend property name.
        field: String,
        /// Excluded values, in order.
        values: Vec<Literal>,
    },
    /// Pre-trusted fragment injected verbatim.
    Raw(String),
}

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    kind: FilterKind,
    join: Option<JoinOperator>,
}

impl FilterExpr {
    fn new(kind: FilterKind) -> Self {
        Self { kind, join: None }
    }

    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Literal>) -> Self {
        Self::new(FilterKind::Compare {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    fn function(field: impl Into<String>, func: StringFunction, value: impl Into<Literal>) -> Self {
        Self::new(FilterKind::Function {
            field: field.into(),
            func,
            value: value.into(),
        })
    }

    /// `field eq value`
    pub fn equal(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::Equal, value)
    }

    /// `field ne value`
    pub fn not_equal(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::NotEqual, value)
    }

    /// `field gt value`
    pub fn greater_than(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::GreaterThan, value)
    }

    /// `field ge value`
    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::GreaterOrEqual, value)
    }

    /// `field lt value`
    pub fn less_than(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::LessThan, value)
    }

    /// `field le value`
    pub fn less_or_equal(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparison::LessOrEqual, value)
    }

    /// `contains(field, value)`
    pub fn contains(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::function(field, StringFunction::Contains, value)
    }

    /// `startswith(field, value)`
    pub fn starts_with(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::function(field, StringFunction::StartsWith, value)
    }

    /// `endswith(field, value)`
    pub fn ends_with(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::function(field, StringFunction::EndsWith, value)
    }

    /// `(field ge from and field le to)`
    pub fn between(
        field: impl Into<String>,
        from: impl Into<Literal>,
        to: impl Into<Literal>,
    ) -> Self {
        Self::new(FilterKind::Between {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// `(field eq v1 or field eq v2 ...)`
    pub fn in_set<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        Self::new(FilterKind::InSet {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// `(field ne v1 and field ne v2 ...)`
    pub fn not_in_set<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        Self::new(FilterKind::NotInSet {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Inject `fragment` into the query exactly as written.
    ///
    /// # Security
    ///
    /// The fragment is neither escaped nor validated. Never build it from
    /// untrusted input; use the typed constructors for user-supplied values.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::new(FilterKind::Raw(fragment.into()))
    }

    /// The predicate this expression carries.
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// Join operator assigned by the query builder, if any.
    pub fn join_operator(&self) -> Option<JoinOperator> {
        self.join
    }

    pub(crate) fn set_join_operator(&mut self, op: Option<JoinOperator>) {
        self.join = op;
    }

    /// Render this expression in OData filter syntax.
    pub fn execute(&self) -> String {
        self.to_string()
    }
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    field: &str,
    op: Comparison,
    joiner: JoinOperator,
    values: &[Literal],
) -> fmt::Result {
    f.write_str("(")?;
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            write!(f, " {joiner} ")?;
        }
        write!(f, "{field} {} {value}", op.as_str())?;
    }
    f.write_str(")")
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FilterKind::Compare { field, op, value } => {
                write!(f, "{field} {} {value}", op.as_str())
            }
            FilterKind::Function { field, func, value } => {
                write!(f, "{}({field}, {value})", func.as_str())
            }
            FilterKind::Between { field, from, to } => {
                write!(f, "({field} ge {from} and {field} le {to})")
            }
            FilterKind::InSet { field, values } => {
                write_group(f, field, Comparison::Equal, JoinOperator::Or, values)
            }
            FilterKind::NotInSet { field, values } => {
                write_group(f, field, Comparison::NotEqual, JoinOperator::And, values)
            }
            FilterKind::Raw(fragment) => f.write_str(fragment),
        }
    }
}
