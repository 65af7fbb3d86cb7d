//! Scalar column value type.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A flat, name-ordered map of column values.
///
/// Ordering by name makes every encoding of the map deterministic.
pub type ColumnMap = BTreeMap<String, Value>;

/// A scalar column value.
///
/// Values are never composite. Booleans have no variant of their own:
/// they normalize to `Integer(1)` / `Integer(0)` on conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`, or an absent column.
    Null,
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Floating point number. Must be finite to be stored.
    Float(f64),
    /// UTF-8 text.
    Text(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float. Integers widen.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as an integer the way SQL drivers hand them back:
    /// either a native integer or a decimal string.
    pub fn as_numeric_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns false for NaN and infinite floats, which cannot be encoded.
    pub fn is_storable(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(i64::from(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// Builds a [`ColumnMap`] from `name => value` pairs.
///
/// ```
/// use entirow_codec::{columns, Value};
///
/// let map = columns! { "title" => "Hello", "views" => 3 };
/// assert_eq!(map["views"], Value::Integer(3));
/// ```
#[macro_export]
macro_rules! columns {
    () => { $crate::ColumnMap::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ColumnMap::new();
        $( map.insert(::std::string::String::from($name), $crate::Value::from($value)); )+
        map
    }};
}
