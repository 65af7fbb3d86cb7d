//! Fault injection for driver tests.

use entirow_codec::RowId;
use std::fmt;

/// A driver operation that a [`FailPoint`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    /// `get`
    Get,
    /// `insert`
    Insert,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `commit`
    Commit,
}

impl fmt::Display for DriverOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverOp::Get => "get",
            DriverOp::Insert => "insert",
            DriverOp::Update => "update",
            DriverOp::Delete => "delete",
            DriverOp::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Makes matching driver calls fail with [`crate::StorageError::Injected`].
///
/// A point with no table matches every table; a point with no id matches
/// every call regardless of its id condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailPoint {
    /// Operation to fail.
    pub op: DriverOp,
    /// Restrict to one table.
    pub table: Option<String>,
    /// Restrict to calls whose conditions pin this id.
    pub id: Option<RowId>,
}

impl FailPoint {
    /// Fails every call of `op`.
    pub fn new(op: DriverOp) -> Self {
        Self {
            op,
            table: None,
            id: None,
        }
    }

    /// Restricts the point to `table`.
    #[must_use]
    pub fn on_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Restricts the point to calls targeting `id`.
    #[must_use]
    pub fn on_id(mut self, id: RowId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn matches(&self, op: DriverOp, table: &str, id: Option<RowId>) -> bool {
        self.op == op
            && self.table.as_deref().map_or(true, |t| t == table)
            && self.id.map_or(true, |want| id == Some(want))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_point_matches_any_table() {
        let point = FailPoint::new(DriverOp::Delete);
        assert!(point.matches(DriverOp::Delete, "users", None));
        assert!(point.matches(DriverOp::Delete, "posts", RowId::new(3)));
        assert!(!point.matches(DriverOp::Update, "users", None));
    }

    #[test]
    fn restricted_point_needs_table_and_id() {
        let id = RowId::new(4).unwrap();
        let point = FailPoint::new(DriverOp::Delete).on_table("comments").on_id(id);
        assert!(point.matches(DriverOp::Delete, "comments", Some(id)));
        assert!(!point.matches(DriverOp::Delete, "comments", RowId::new(5)));
        assert!(!point.matches(DriverOp::Delete, "comments", None));
        assert!(!point.matches(DriverOp::Delete, "posts", Some(id)));
    }
}
