//! In-memory entity records.

use crate::entity::by_id;
use crate::error::{CoreError, CoreResult};
use crate::schema::EntityType;
use entirow_codec::{content_hash, decode_blob, encode_blob, ColumnMap, RowId, Value};
use entirow_storage::{Columns, Driver, QueryOptions};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a cached record.
///
/// Every successful load of the same `(type, id)` through one session yields
/// a clone of the same `Arc`, so a `set` through one handle is visible
/// through all of them.
pub type Entity = Arc<EntityRecord>;

/// The mutable in-memory form of one row.
///
/// A record keeps a merged view of the row's columns and its decoded blob,
/// and remembers where each value physically lives so that `set` knows when
/// the blob has to be rewritten.
pub struct EntityRecord {
    id: RowId,
    ty: Arc<EntityType>,
    driver: Arc<dyn Driver>,
    state: RwLock<RecordState>,
}

#[derive(Debug, Clone, Default)]
struct RecordState {
    /// Merged columns; the only source for `get`.
    data: ColumnMap,
    /// Columns whose value sits in a non-null row cell.
    row_cells: BTreeSet<String>,
    /// Keys present in the stored blob.
    blob_keys: BTreeSet<String>,
}

/// How `apply` treats values equal to the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Skip unchanged values.
    Normal,
    /// Re-stage unchanged values that sit in the wrong physical place.
    Reindex,
}

impl EntityRecord {
    /// Reads the full row for `id` and builds a record from it.
    pub(crate) fn load(ty: Arc<EntityType>, driver: Arc<dyn Driver>, id: RowId) -> CoreResult<Self> {
        let row = driver
            .get(ty.table(), &Columns::All, &by_id(ty.column_id(), id), &QueryOptions::single())?
            .into_first()
            .ok_or_else(|| CoreError::not_found_id(ty.table(), id))?;
        Self::from_row(ty, driver, id, row)
    }

    /// Builds a record from a row that was already fetched.
    ///
    /// Row columns win over blob keys of the same name. Null row cells are
    /// not part of the merged view.
    pub(crate) fn from_row(
        ty: Arc<EntityType>,
        driver: Arc<dyn Driver>,
        id: RowId,
        mut row: ColumnMap,
    ) -> CoreResult<Self> {
        let blob_text = match row.remove(ty.column_blob()) {
            Some(Value::Text(text)) => text,
            Some(Value::Null) | None => {
                return Err(CoreError::schema(format!(
                    "blob column '{}' missing in table '{}'",
                    ty.column_blob(),
                    ty.table()
                )))
            }
            Some(other) => {
                return Err(CoreError::schema(format!(
                    "blob column '{}' in table '{}' holds {}, expecting text",
                    ty.column_blob(),
                    ty.table(),
                    other.kind()
                )))
            }
        };

        let mut blob = decode_blob(&blob_text)?;
        let stray: Vec<String> = blob
            .keys()
            .filter(|k| ty.is_protected(k))
            .cloned()
            .collect();
        for key in stray {
            tracing::warn!(table = ty.table(), %id, column = %key, "ignoring managed column found in blob");
            blob.remove(&key);
        }
        blob.retain(|_, v| !v.is_null());

        let blob_keys = blob.keys().cloned().collect();
        let row_cells = row
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect();

        let mut data = blob;
        data.extend(row.into_iter().filter(|(_, v)| !v.is_null()));
        data.insert(ty.column_id().to_string(), Value::from(id));

        Ok(Self {
            id,
            ty,
            driver,
            state: RwLock::new(RecordState {
                data,
                row_cells,
                blob_keys,
            }),
        })
    }

    /// Returns the row id.
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the entity type.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Returns a column's value, or `None` if the column is absent.
    pub fn get(&self, column: &str) -> Option<Value> {
        self.state.read().data.get(column).cloned()
    }

    /// Returns a snapshot of every column.
    pub fn all(&self) -> ColumnMap {
        self.state.read().data.clone()
    }

    /// Returns the current change hash, if the type has a hash column.
    pub fn hash(&self) -> Option<Value> {
        self.ty.column_hash().and_then(|c| self.get(c))
    }

    /// Sets one column. `Value::Null` removes it.
    ///
    /// # Errors
    ///
    /// See [`EntityRecord::set_many`].
    pub fn set(&self, column: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.apply(vec![(column.to_string(), value.into())], WriteMode::Normal)
    }

    /// Sets several columns with at most one driver update.
    ///
    /// Unchanged values are skipped; if nothing changes no I/O happens.
    /// The in-memory state only changes once the update has succeeded.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidColumn`] for an empty column name
    /// - [`CoreError::ProtectedColumn`] for the id, hash or blob column
    /// - [`CoreError::InvalidValue`] for NaN or infinite floats
    /// - [`CoreError::Storage`] if the update fails
    pub fn set_many(&self, changes: &ColumnMap) -> CoreResult<()> {
        let changes = changes
            .iter()
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        self.apply(changes, WriteMode::Normal)
    }

    /// Like [`EntityRecord::set_many`], but with `force_reindex` also
    /// re-stages unchanged values whose physical place no longer matches the
    /// descriptor.
    ///
    /// # Errors
    ///
    /// See [`EntityRecord::set_many`].
    pub fn set_with(&self, changes: &ColumnMap, force_reindex: bool) -> CoreResult<()> {
        let mode = if force_reindex {
            WriteMode::Reindex
        } else {
            WriteMode::Normal
        };
        let changes = changes
            .iter()
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        self.apply(changes, mode)
    }

    /// Moves every column to where the descriptor says it belongs.
    ///
    /// Used after a type's indexed columns changed under existing rows.
    /// Issues no update when every column is already in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the update fails.
    pub fn reindex(&self) -> CoreResult<()> {
        let columns = {
            let state = self.state.read();
            state
                .data
                .iter()
                .filter(|(c, _)| !self.ty.is_protected(c))
                .map(|(c, v)| (c.clone(), v.clone()))
                .collect()
        };
        self.apply(columns, WriteMode::Reindex)
    }

    fn validate(&self, column: &str, value: &Value) -> CoreResult<()> {
        if column.is_empty() {
            return Err(CoreError::InvalidColumn {
                column: column.to_string(),
            });
        }
        if self.ty.is_protected(column) {
            return Err(CoreError::ProtectedColumn {
                column: column.to_string(),
            });
        }
        if !value.is_storable() {
            return Err(CoreError::invalid_value(column, "expecting a finite number"));
        }
        Ok(())
    }

    /// Returns true if the column's stored place disagrees with the descriptor.
    fn misplaced(&self, state: &RecordState, column: &str) -> bool {
        let in_row = state.row_cells.contains(column);
        let in_blob = state.blob_keys.contains(column);
        if self.ty.is_row_column(column) {
            in_blob || !in_row
        } else {
            in_row || !in_blob
        }
    }

    fn apply(&self, changes: Vec<(String, Value)>, mode: WriteMode) -> CoreResult<()> {
        for (column, value) in &changes {
            self.validate(column, value)?;
        }

        let mut state = self.state.write();
        let mut data = state.data.clone();
        let mut staged = ColumnMap::new();
        let mut rebuild_blob = false;

        for (column, value) in changes {
            let unchanged = match data.get(&column) {
                Some(current) => *current == value,
                None => value.is_null(),
            };
            if unchanged && (mode == WriteMode::Normal || !self.misplaced(&state, &column)) {
                continue;
            }

            if value.is_null() {
                data.remove(&column);
            } else {
                data.insert(column.clone(), value.clone());
            }

            if self.ty.is_row_column(&column) {
                // The only way to drop a key from the blob is to re-encode it.
                if state.blob_keys.contains(&column) {
                    rebuild_blob = true;
                }
                staged.insert(column, value);
            } else {
                rebuild_blob = true;
                if value.is_null() && state.row_cells.contains(&column) {
                    staged.insert(column, Value::Null);
                }
            }
        }

        let mut new_blob_keys = None;
        if rebuild_blob {
            let mut blob = ColumnMap::new();
            for (column, value) in &data {
                if self.ty.is_protected(column) {
                    continue;
                }
                if self.ty.is_row_column(column) {
                    if state.blob_keys.contains(column) {
                        staged.insert(column.clone(), value.clone());
                    }
                } else {
                    blob.insert(column.clone(), value.clone());
                    if state.row_cells.contains(column) {
                        staged.insert(column.clone(), Value::Null);
                    }
                }
            }
            staged.insert(
                self.ty.column_blob().to_string(),
                Value::Text(encode_blob(&blob)?),
            );
            tracing::debug!(
                table = self.ty.table(),
                id = %self.id,
                keys = blob.len(),
                "blob rebuilt"
            );
            new_blob_keys = Some(blob.into_keys().collect::<BTreeSet<_>>());
        }

        if staged.is_empty() {
            return Ok(());
        }

        if let Some(hash_column) = self.ty.column_hash() {
            data.remove(hash_column);
            let hash = content_hash(&data)?;
            data.insert(hash_column.to_string(), hash.clone());
            staged.insert(hash_column.to_string(), hash);
        }

        let touched = self.driver.update(
            self.ty.table(),
            &staged,
            &by_id(self.ty.column_id(), self.id),
            &QueryOptions::new().limit(1),
        )?;
        tracing::debug!(
            table = self.ty.table(),
            id = %self.id,
            columns = staged.len(),
            touched,
            "record updated"
        );

        for (column, value) in &staged {
            if column == self.ty.column_blob() {
                continue;
            }
            if value.is_null() {
                state.row_cells.remove(column);
            } else {
                state.row_cells.insert(column.clone());
            }
        }
        if let Some(keys) = new_blob_keys {
            state.blob_keys = keys;
        }
        state.data = data;
        Ok(())
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("table", &self.ty.table())
            .field("id", &self.id)
            .field("data", &self.state.read().data)
            .finish_non_exhaustive()
    }
}
