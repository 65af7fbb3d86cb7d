//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every write in a plain map and checks
//! records against it, both in memory and through a fresh session.

use crate::fixtures::TestSession;
use entirow_codec::{content_hash, decode_blob, ColumnMap, RowId, Value};
use entirow_core::{Entity, EntityType};
use entirow_storage::InMemoryDriver;
use std::collections::HashMap;

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The blog fixture.
    pub blog: TestSession,
    /// Expected user columns per record, without id and hash.
    expected: HashMap<(String, RowId), ColumnMap>,
}

impl IntegrationHarness {
    /// Creates a new harness over a fresh blog fixture.
    pub fn new() -> Self {
        Self {
            blog: TestSession::blog(),
            expected: HashMap::new(),
        }
    }

    /// Creates a record and tracks its columns.
    pub fn create(&mut self, table: &str, columns: &ColumnMap) -> Entity {
        let entity = self
            .blog
            .class(table)
            .expect("Unknown table")
            .create(columns)
            .expect("Failed to create entity");
        let mut expected = ColumnMap::new();
        apply(&mut expected, columns);
        self.expected
            .insert((table.to_string(), entity.id()), expected);
        entity
    }

    /// Writes `changes` to a tracked record.
    pub fn set(&mut self, entity: &Entity, changes: &ColumnMap) {
        entity.set_many(changes).expect("Failed to set columns");
        let key = (entity.entity_type().table().to_string(), entity.id());
        apply(self.expected.entry(key).or_default(), changes);
    }

    /// Checks one record in memory and through a fresh session.
    pub fn verify(&self, table: &str, id: RowId) {
        let expected = self
            .expected
            .get(&(table.to_string(), id))
            .expect("Record is not tracked");

        let cached = self
            .blog
            .cached(table, id)
            .expect("Tracked record should be cached");
        assert_eq!(&user_columns(&cached), expected, "memory mismatch for {table} {id}");

        let fresh = self
            .blog
            .reopen()
            .class(table)
            .and_then(|class| class.load(id.get()))
            .expect("Failed to reload entity");
        assert_eq!(&user_columns(&fresh), expected, "reload mismatch for {table} {id}");
        assert_eq!(fresh.hash(), cached.hash(), "hash mismatch for {table} {id}");

        physical::assert_split(&self.blog.driver, cached.entity_type(), id);
    }

    /// Checks every tracked record.
    pub fn verify_all(&self) {
        for (table, id) in self.expected.keys() {
            self.verify(table, *id);
        }
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(target: &mut ColumnMap, changes: &ColumnMap) {
    for (column, value) in changes {
        if value.is_null() {
            target.remove(column);
        } else {
            target.insert(column.clone(), value.clone());
        }
    }
}

/// The columns a caller wrote: everything but id and hash.
pub fn user_columns(entity: &Entity) -> ColumnMap {
    let ty = entity.entity_type();
    let mut columns = entity.all();
    columns.remove(ty.column_id());
    if let Some(hash) = ty.column_hash() {
        columns.remove(hash);
    }
    columns
}

/// Checks on what is physically stored.
pub mod physical {
    use super::*;

    /// Asserts that every value of the row sits where the descriptor says:
    /// row columns in row cells, everything else in the blob, nothing twice.
    pub fn assert_split(driver: &InMemoryDriver, ty: &EntityType, id: RowId) {
        let mut row = driver.row(ty.table(), id).expect("Row should exist");
        let blob = match row.remove(ty.column_blob()) {
            Some(Value::Text(text)) => decode_blob(&text).expect("Blob should decode"),
            other => panic!("blob of {} {id} is {other:?}", ty.table()),
        };

        for (column, value) in &row {
            if value.is_null() || ty.is_protected(column) {
                continue;
            }
            assert!(
                ty.is_row_column(column),
                "{} {id}: '{column}' is stored in the row but not indexed",
                ty.table()
            );
        }
        for column in blob.keys() {
            assert!(
                !ty.is_row_column(column) && !ty.is_protected(column),
                "{} {id}: '{column}' is stored in the blob but belongs in the row",
                ty.table()
            );
        }
    }

    /// Asserts that the stored hash matches the content of the record.
    pub fn assert_hash(entity: &Entity) {
        let Some(hash_column) = entity.entity_type().column_hash() else {
            return;
        };
        let mut all = entity.all();
        let hash = all.remove(hash_column);
        assert_eq!(
            hash,
            Some(content_hash(&all).expect("Content should hash")),
            "stale hash on {} {}",
            entity.entity_type().table(),
            entity.id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entirow_codec::columns;

    #[test]
    fn test_integration_harness() {
        let mut harness = IntegrationHarness::new();
        let user = harness.create("users", &columns! { "email" => "a@x", "bio" => "hi" });
        let post = harness.create(
            "posts",
            &columns! { "_users" => user.id(), "status" => "draft", "body" => "text" },
        );
        assert_eq!(harness.tracked_count(), 2);

        harness.set(&post, &columns! { "status" => "live", "body" => Value::Null });
        harness.set(&user, &columns! { "age" => 40 });

        harness.verify_all();
        physical::assert_hash(&post);
    }

    #[test]
    fn user_columns_drop_managed_columns() {
        let mut harness = IntegrationHarness::new();
        let user = harness.create("users", &columns! { "email" => "a@x" });
        harness.set(&user, &columns! { "bio" => "x" });

        assert_eq!(
            user_columns(&user),
            columns! { "email" => "a@x", "bio" => "x" }
        );
    }
}
