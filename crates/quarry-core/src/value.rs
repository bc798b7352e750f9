use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Value
///
/// Literal values that can appear inside a compiled closure or be supplied
/// through a captured variable. Integers of every width share `Int`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    /// Semantic type of a literal; integers default to `Int`.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::Text(_) => ValueType::Text,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as a query-language literal token.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => format!("{d:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

///
/// ValueType
///
/// Resolved semantic type carried by every expression node.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Long,
    Double,
    Text,
    Entity(String),
    Collection(Box<Self>),
    Tuple(Vec<Self>),
    Stream(Box<Self>),
    StreamSource,
    /// Erased parameter type; accepts whatever the handler resolves.
    Any,
}

impl ValueType {
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    #[must_use]
    pub fn stream(element: Self) -> Self {
        Self::Stream(Box::new(element))
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Double)
    }

    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Scalar types usable as sort keys and comparison operands.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int | Self::Long | Self::Double | Self::Text
        )
    }

    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Wider of two numeric types, `None` if either is not numeric.
    #[must_use]
    pub fn widen(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Double, b) | (b, Self::Double) if b.is_numeric() => Some(Self::Double),
            (Self::Long, b) | (b, Self::Long) if b.is_numeric() => Some(Self::Long),
            (Self::Int, Self::Int) => Some(Self::Int),
            _ => None,
        }
    }

    /// Whether a value of `self` may flow where `expected` is declared.
    #[must_use]
    pub fn accepts(&self, expected: &Self) -> bool {
        if matches!(expected, Self::Any) || matches!(self, Self::Any) || self == expected {
            return true;
        }
        if self.is_numeric() && expected.is_numeric() {
            return true;
        }

        match (self, expected) {
            (Self::Null, _) => true,
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.accepts(y))
            }
            (Self::Stream(a), Self::Stream(b)) | (Self::Collection(a), Self::Collection(b)) => {
                a.accepts(b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Double => f.write_str("double"),
            Self::Text => f.write_str("text"),
            Self::Entity(name) => f.write_str(name),
            Self::Collection(inner) => write!(f, "collection<{inner}>"),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Stream(inner) => write!(f, "stream<{inner}>"),
            Self::StreamSource => f.write_str("stream-source"),
            Self::Any => f.write_str("any"),
        }
    }
}
