//! Literal values embedded in filter expressions and their OData escaping.

use std::fmt;

/// A scalar value that can appear on the right-hand side of a filter.
///
/// Numbers render bare; everything else renders as a quoted OData string.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Signed integer, rendered unquoted.
    Integer(i64),
    /// Unsigned integer too large for `i64`, rendered unquoted.
    Unsigned(u64),
    /// Floating-point number, rendered unquoted.
    Float(f64),
    /// String, rendered single-quoted with embedded quotes doubled.
    Text(String),
}

impl Literal {
    /// Build a quoted literal from any displayable value (dates, booleans, ids).
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    /// Whether this literal renders without quotes.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Unsigned(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Escape a value for embedding into an OData expression.
///
/// ```
/// use servicelayer_query::escape;
///
/// assert_eq!(escape(42), "42");
/// assert_eq!(escape("O'Brien"), "'O''Brien'");
/// ```
pub fn escape(value: impl Into<Literal>) -> String {
    value.into().to_string()
}

macro_rules! literal_from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Literal {
            fn from(value: $ty) -> Self {
                Self::Integer(i64::from(value))
            }
        })*
    };
}

macro_rules! literal_from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Literal {
            fn from(value: $ty) -> Self {
                Self::Unsigned(value as u64)
            }
        })*
    };
}

literal_from_signed!(i8, i16, i32, i64, u8, u16, u32);
literal_from_unsigned!(u64, usize);

impl From<isize> for Literal {
    fn from(value: isize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::display(value)
    }
}

impl From<char> for Literal {
    fn from(value: char) -> Self {
        Self::display(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

/// Right-hand side of a filter call: one value or an ordered list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single value.
    Scalar(Literal),
    /// An ordered collection, used by `in`, `notin` and `between`.
    List(Vec<Literal>),
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! operand_from_scalar {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Operand {
            fn from(value: $ty) -> Self {
                Self::Scalar(value.into())
            }
        })*
    };
}

operand_from_scalar!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char, &str, String,
    &String
);

impl<T: Into<Literal>> From<Vec<T>> for Operand {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Literal>, const N: usize> From<[T; N]> for Operand {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Literal> + Clone> From<&[T]> for Operand {
    fn from(values: &[T]) -> Self {
        Self::List(values.iter().cloned().map(Into::into).collect())
    }
}
