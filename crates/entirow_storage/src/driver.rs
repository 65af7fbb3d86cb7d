//! Driver trait and query types.

use crate::error::StorageResult;
use entirow_codec::{ColumnMap, RowId};

/// Equality conditions on a read, update or delete.
///
/// Every entry must match (the entries are ANDed). An empty map matches
/// every row.
pub type Conditions = ColumnMap;

/// Which columns a read returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    /// Every column of the table (`*`).
    #[default]
    All,
    /// Only the listed columns, in this order.
    Only(Vec<String>),
}

impl Columns {
    /// Creates a projection over the given column names.
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }
}

/// Options modulating a driver call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// Maximum number of rows to read or touch.
    pub limit: Option<usize>,
    /// Expect at most one row. Implies a limit of 1.
    pub single: bool,
}

impl QueryOptions {
    /// Options with no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a single-row call.
    #[must_use]
    pub fn single() -> Self {
        Self {
            limit: Some(1),
            single: true,
        }
    }

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The limit the driver should actually apply.
    pub fn effective_limit(&self) -> Option<usize> {
        if self.single {
            Some(self.limit.map_or(1, |l| l.min(1)))
        } else {
            self.limit
        }
    }
}

/// Rows returned by [`Driver::get`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Number of rows returned.
    pub count: usize,
    /// The rows, in driver order.
    pub rows: Vec<ColumnMap>,
}

impl QueryResult {
    /// Wraps a list of rows.
    pub fn from_rows(rows: Vec<ColumnMap>) -> Self {
        Self {
            count: rows.len(),
            rows,
        }
    }

    /// Returns true if no row matched.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Takes the first row, if any.
    pub fn into_first(self) -> Option<ColumnMap> {
        self.rows.into_iter().next()
    }
}

/// The relational driver that entirow talks to.
///
/// A driver turns these calls into SQL (or anything else) against a store of
/// tables with a numeric primary key. entirow only ever issues equality
/// conditions and never nests transactions.
///
/// # Invariants
///
/// - `get` with `QueryOptions::single` returns at most one row
/// - `insert` returns the id assigned to the new row
/// - Writes issued between `transaction_begin` and `rollback` leave no trace
/// - Drivers must be `Send + Sync`; they serialize access internally
///
/// # Implementors
///
/// - [`super::InMemoryDriver`] - For testing and embedding
pub trait Driver: Send + Sync {
    /// Reads rows of `table` matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table or a column does not exist, or the
    /// backend fails.
    fn get(
        &self,
        table: &str,
        columns: &Columns,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<QueryResult>;

    /// Inserts a row and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn insert(&self, table: &str, row: &ColumnMap) -> StorageResult<RowId>;

    /// Writes `columns` into every row matching `conditions`.
    ///
    /// Returns the number of rows touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be written.
    fn update(
        &self,
        table: &str,
        columns: &ColumnMap,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<usize>;

    /// Removes every row matching `conditions`.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be removed.
    fn delete(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<usize>;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if one is already open or the backend refuses.
    fn transaction_begin(&self) -> StorageResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails.
    fn commit(&self) -> StorageResult<()>;

    /// Discards the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&self) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_caps_limit_at_one() {
        assert_eq!(QueryOptions::single().effective_limit(), Some(1));
        assert_eq!(
            QueryOptions {
                limit: Some(10),
                single: true
            }
            .effective_limit(),
            Some(1)
        );
        assert_eq!(QueryOptions::new().limit(5).effective_limit(), Some(5));
        assert_eq!(QueryOptions::new().effective_limit(), None);
    }

    #[test]
    fn columns_projection() {
        assert_eq!(
            Columns::only(["id", "hash"]),
            Columns::Only(vec!["id".to_string(), "hash".to_string()])
        );
        assert_eq!(Columns::default(), Columns::All);
    }
}
