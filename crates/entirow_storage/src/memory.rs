//! In-memory driver for testing and embedding.

use crate::driver::{Columns, Conditions, Driver, QueryOptions, QueryResult};
use crate::error::{StorageError, StorageResult};
use crate::fault::{DriverOp, FailPoint};
use crate::stats::DriverStats;
use entirow_codec::{ColumnMap, RowId, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// An in-memory relational driver.
///
/// Tables must be declared with [`InMemoryDriver::create_table`] before use.
/// Reads with [`Columns::All`] return every declared column, with `Null` for
/// cells that were never written, the way a SQL `SELECT *` does.
///
/// Transactions snapshot all tables on `transaction_begin` and restore the
/// snapshot on `rollback`. Only one transaction may be open at a time.
///
/// # Thread Safety
///
/// This driver is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use entirow_codec::columns;
/// use entirow_storage::{Columns, Driver, InMemoryDriver, QueryOptions};
///
/// let driver = InMemoryDriver::new();
/// driver.create_table("users", "id", ["name", "data"]).unwrap();
/// let id = driver.insert("users", &columns! { "name" => "ada" }).unwrap();
///
/// let found = driver
///     .get("users", &Columns::All, &columns! { "id" => id }, &QueryOptions::single())
///     .unwrap();
/// assert_eq!(found.count, 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    state: Mutex<State>,
    fail_points: Mutex<Vec<FailPoint>>,
    stats: DriverStats,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    snapshot: Option<BTreeMap<String, Table>>,
}

impl State {
    fn table(&self, name: &str) -> StorageResult<&Table> {
        self.tables.get(name).ok_or_else(|| StorageError::UnknownTable {
            table: name.to_string(),
        })
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownTable {
                table: name.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
struct Table {
    name: String,
    id_column: String,
    columns: Vec<String>,
    /// Non-null cells only; a missing cell reads as `Null`.
    rows: BTreeMap<i64, ColumnMap>,
    next_id: i64,
}

impl Table {
    fn has_column(&self, column: &str) -> bool {
        column == self.id_column || self.columns.iter().any(|c| c == column)
    }

    fn check_columns<'a, I>(&self, names: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        match names.into_iter().find(|name| !self.has_column(name)) {
            Some(column) => Err(StorageError::UnknownColumn {
                table: self.name.clone(),
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }

    fn cell(&self, id: i64, row: &ColumnMap, column: &str) -> Value {
        if column == self.id_column {
            Value::Integer(id)
        } else {
            row.get(column).cloned().unwrap_or(Value::Null)
        }
    }

    fn matching_ids(&self, conditions: &Conditions, limit: Option<usize>) -> Vec<i64> {
        self.rows
            .iter()
            .filter(|(id, row)| {
                conditions
                    .iter()
                    .all(|(column, wanted)| values_match(&self.cell(**id, row, column), wanted))
            })
            .map(|(id, _)| *id)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn project(&self, id: i64, row: &ColumnMap, columns: &Columns) -> ColumnMap {
        match columns {
            Columns::All => std::iter::once(&self.id_column)
                .chain(self.columns.iter())
                .map(|c| (c.clone(), self.cell(id, row, c)))
                .collect(),
            Columns::Only(names) => names
                .iter()
                .map(|c| (c.clone(), self.cell(id, row, c)))
                .collect(),
        }
    }

    fn pinned_id(&self, conditions: &Conditions) -> Option<RowId> {
        conditions.get(&self.id_column).and_then(RowId::from_value)
    }
}

/// SQL-style equality: integers compare equal to their decimal text.
fn values_match(cell: &Value, wanted: &Value) -> bool {
    if cell == wanted {
        return true;
    }
    match (cell.as_numeric_integer(), wanted.as_numeric_integer()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl InMemoryDriver {
    /// Creates a new driver with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a table with an auto-increment primary key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableExists`] if the name is taken.
    pub fn create_table<I, S>(&self, name: &str, id_column: &str, columns: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        if state.tables.contains_key(name) {
            return Err(StorageError::TableExists {
                table: name.to_string(),
            });
        }
        let columns = columns
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| c != id_column)
            .collect();
        state.tables.insert(
            name.to_string(),
            Table {
                name: name.to_string(),
                id_column: id_column.to_string(),
                columns,
                rows: BTreeMap::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    /// Returns every declared column of a row, bypassing stats and fail points.
    pub fn row(&self, table: &str, id: RowId) -> Option<ColumnMap> {
        let state = self.state.lock();
        let table = state.tables.get(table)?;
        let row = table.rows.get(&id.get())?;
        Some(table.project(id.get(), row, &Columns::All))
    }

    /// Returns the number of rows in a table (zero for unknown tables).
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.state.lock().snapshot.is_some()
    }

    /// Returns the call counters.
    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Installs a fail point.
    pub fn fail_on(&self, point: FailPoint) {
        self.fail_points.lock().push(point);
    }

    /// Removes all fail points.
    pub fn clear_fail_points(&self) {
        self.fail_points.lock().clear();
    }

    fn check_fail_point(&self, op: DriverOp, table: &str, id: Option<RowId>) -> StorageResult<()> {
        if self
            .fail_points
            .lock()
            .iter()
            .any(|p| p.matches(op, table, id))
        {
            tracing::debug!(%op, table, ?id, "fail point triggered");
            return Err(StorageError::Injected {
                op: op.to_string(),
                table: table.to_string(),
            });
        }
        Ok(())
    }
}

impl Driver for InMemoryDriver {
    fn get(
        &self,
        table: &str,
        columns: &Columns,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<QueryResult> {
        self.stats.record_read();
        let state = self.state.lock();
        let t = state.table(table)?;
        self.check_fail_point(DriverOp::Get, table, t.pinned_id(conditions))?;
        t.check_columns(conditions.keys())?;
        if let Columns::Only(names) = columns {
            t.check_columns(names)?;
        }

        let rows = t
            .matching_ids(conditions, options.effective_limit())
            .into_iter()
            .filter_map(|id| t.rows.get(&id).map(|row| t.project(id, row, columns)))
            .collect();
        Ok(QueryResult::from_rows(rows))
    }

    fn insert(&self, table: &str, row: &ColumnMap) -> StorageResult<RowId> {
        self.stats.record_insert();
        self.check_fail_point(DriverOp::Insert, table, None)?;
        let mut state = self.state.lock();
        let t = state.table_mut(table)?;
        t.check_columns(row.keys())?;

        let id = match row.get(&t.id_column) {
            Some(value) => RowId::from_value(value)
                .ok_or_else(|| StorageError::Backend(format!("invalid id {value}")))?
                .get(),
            None => t.next_id,
        };
        if t.rows.contains_key(&id) {
            return Err(StorageError::DuplicateId {
                table: table.to_string(),
                id,
            });
        }

        let cells = row
            .iter()
            .filter(|(c, v)| **c != t.id_column && !v.is_null())
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        t.rows.insert(id, cells);
        t.next_id = t.next_id.max(id + 1);

        RowId::new(id).ok_or_else(|| StorageError::Backend(format!("invalid id {id}")))
    }

    fn update(
        &self,
        table: &str,
        columns: &ColumnMap,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<usize> {
        self.stats.record_update();
        let mut state = self.state.lock();
        let t = state.table_mut(table)?;
        self.check_fail_point(DriverOp::Update, table, t.pinned_id(conditions))?;
        t.check_columns(conditions.keys().chain(columns.keys()))?;
        if columns.contains_key(&t.id_column) {
            return Err(StorageError::Backend(format!(
                "primary key '{}' of '{table}' cannot be updated",
                t.id_column
            )));
        }

        let ids = t.matching_ids(conditions, options.effective_limit());
        for id in &ids {
            if let Some(row) = t.rows.get_mut(id) {
                for (column, value) in columns {
                    if value.is_null() {
                        row.remove(column);
                    } else {
                        row.insert(column.clone(), value.clone());
                    }
                }
            }
        }
        Ok(ids.len())
    }

    fn delete(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &QueryOptions,
    ) -> StorageResult<usize> {
        self.stats.record_delete();
        let mut state = self.state.lock();
        let t = state.table_mut(table)?;
        self.check_fail_point(DriverOp::Delete, table, t.pinned_id(conditions))?;
        t.check_columns(conditions.keys())?;

        let ids = t.matching_ids(conditions, options.effective_limit());
        for id in &ids {
            t.rows.remove(id);
        }
        Ok(ids.len())
    }

    fn transaction_begin(&self) -> StorageResult<()> {
        self.stats.record_begin();
        let mut state = self.state.lock();
        if state.snapshot.is_some() {
            return Err(StorageError::TransactionActive);
        }
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.snapshot.is_none() {
            return Err(StorageError::NoTransaction);
        }
        self.check_fail_point(DriverOp::Commit, "", None)?;
        state.snapshot = None;
        self.stats.record_commit();
        Ok(())
    }

    fn rollback(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        let snapshot = state.snapshot.take().ok_or(StorageError::NoTransaction)?;
        state.tables = snapshot;
        self.stats.record_rollback();
        tracing::debug!("in-memory transaction rolled back");
        Ok(())
    }
}
