//! Cascade delete over the schema graph.

use crate::entity::{by_id, row_id_of};
use crate::error::CoreResult;
use crate::schema::{EntityType, SchemaRegistry};
use entirow_codec::{RowId, Value};
use entirow_storage::{Columns, Driver, QueryOptions};
use std::collections::HashSet;
use std::sync::Arc;

/// A row removed by a cascade delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletedRow {
    /// Table the row was removed from.
    pub table: String,
    /// Id of the removed row.
    pub id: RowId,
}

/// Deletes a row and every row that transitively links to it.
///
/// The walk is depth-first with an explicit stack, so deep schemas do not
/// grow the call stack, and a `(table, id)` pair is never visited twice.
/// The caller owns the transaction.
pub(crate) struct CascadeDeleter<'a> {
    driver: &'a dyn Driver,
    registry: &'a SchemaRegistry,
}

impl<'a> CascadeDeleter<'a> {
    pub(crate) fn new(driver: &'a dyn Driver, registry: &'a SchemaRegistry) -> Self {
        Self { driver, registry }
    }

    /// Deletes `(ty, id)` and its descendants, returning the removed rows in
    /// deletion order.
    pub(crate) fn run(&self, ty: Arc<EntityType>, id: RowId) -> CoreResult<Vec<DeletedRow>> {
        let mut stack = vec![(ty, id)];
        let mut visited = HashSet::new();
        let mut deleted = Vec::new();

        while let Some((ty, id)) = stack.pop() {
            if !visited.insert((ty.table().to_string(), id)) {
                continue;
            }

            let removed = self.driver.delete(
                ty.table(),
                &by_id(ty.column_id(), id),
                &QueryOptions::new().limit(1),
            )?;
            if removed == 0 {
                // Children of a vanished row are still orphans, keep walking.
                tracing::debug!(table = ty.table(), %id, "cascade target already gone");
            } else {
                tracing::debug!(table = ty.table(), %id, "cascade deleted row");
                deleted.push(DeletedRow {
                    table: ty.table().to_string(),
                    id,
                });
            }

            let mut pending = Vec::new();
            for link in self.registry.children_of(ty.table()) {
                let projection = Columns::only([link.child.column_id()]);
                for column in &link.columns {
                    let conditions = [(column.clone(), Value::from(id))].into_iter().collect();
                    let rows = self
                        .driver
                        .get(link.child.table(), &projection, &conditions, &QueryOptions::new())?
                        .rows;
                    for row in rows {
                        let child_id = row_id_of(&link.child, &row)?;
                        pending.push((Arc::clone(&link.child), child_id));
                    }
                }
            }
            // Reverse so the first child found is deleted first.
            stack.extend(pending.into_iter().rev());
        }

        Ok(deleted)
    }
}
