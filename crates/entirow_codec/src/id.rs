//! Row identifier.

use crate::value::Value;
use std::fmt;

/// Primary key of a row.
///
/// Row IDs are:
/// - Strictly positive
/// - Assigned by the driver on insert
/// - Immutable once assigned
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(i64);

impl RowId {
    /// Creates a row ID, returning `None` unless `id >= 1`.
    #[must_use]
    pub const fn new(id: i64) -> Option<Self> {
        if id >= 1 {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Reads an ID out of a column value.
    ///
    /// Accepts integers and decimal strings, since drivers disagree on which
    /// they return for key columns.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_numeric_integer().and_then(Self::new)
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        Value::Integer(id.0)
    }
}

impl From<RowId> for i64 {
    fn from(id: RowId) -> Self {
        id.0
    }
}

impl TryFrom<i64> for RowId {
    type Error = i64;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id).ok_or(id)
    }
}
