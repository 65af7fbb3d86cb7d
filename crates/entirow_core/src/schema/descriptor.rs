//! Entity type descriptor.

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet};

/// Prefix used by [`EntityTypeBuilder::parent`] to name parent-link columns.
pub const PARENT_LINK_PREFIX: &str = "_";

/// Static description of how one entity kind maps onto a table.
///
/// An entity's columns are split between real row columns and a single blob
/// column holding everything else:
/// - `id` and `hash` columns are managed by entirow and never enter the blob
/// - indexed columns and parent-link columns are stored as row columns
/// - every other column is stored in the blob
///
/// Descriptors are immutable once built; register them with
/// [`crate::Session::register`].
///
/// # Example
///
/// ```rust
/// use entirow_core::EntityType;
///
/// let posts = EntityType::builder("posts")
///     .index("status")
///     .parent("users")
///     .build()
///     .unwrap();
///
/// assert_eq!(posts.column_blob(), "data");
/// assert!(posts.is_row_column("_users"));
/// assert!(!posts.is_row_column("body"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    table: String,
    id_column: String,
    hash_column: Option<String>,
    blob_column: String,
    indexes: BTreeSet<String>,
    /// Link column -> parent table.
    parents: BTreeMap<String, String>,
}

impl EntityType {
    /// Starts a descriptor for `table` with the default column names
    /// (`id`, `hash`, `data`).
    pub fn builder(table: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(table)
    }

    /// Returns the table name, which also names the entity type.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the primary key column.
    pub fn column_id(&self) -> &str {
        &self.id_column
    }

    /// Returns the hash column, if hashing is enabled.
    pub fn column_hash(&self) -> Option<&str> {
        self.hash_column.as_deref()
    }

    /// Returns the blob column.
    pub fn column_blob(&self) -> &str {
        &self.blob_column
    }

    /// Returns the declared indexed columns.
    pub fn indexes(&self) -> &BTreeSet<String> {
        &self.indexes
    }

    /// Returns the parent links (link column -> parent table).
    pub fn parent_links(&self) -> &BTreeMap<String, String> {
        &self.parents
    }

    /// Returns true if `column` is declared indexed.
    pub fn is_indexed(&self, column: &str) -> bool {
        self.indexes.contains(column)
    }

    /// Returns true if `column` links to a parent.
    pub fn is_parent_link(&self, column: &str) -> bool {
        self.parents.contains_key(column)
    }

    /// Returns true if `column` belongs in a row column rather than the blob.
    pub fn is_row_column(&self, column: &str) -> bool {
        self.is_indexed(column) || self.is_parent_link(column)
    }

    /// Returns true for the id, hash and blob columns.
    pub fn is_protected(&self, column: &str) -> bool {
        column == self.id_column
            || column == self.blob_column
            || self.hash_column.as_deref() == Some(column)
    }

    /// Returns the link columns that point at `parent_table`.
    pub fn links_to<'a>(&'a self, parent_table: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.parents
            .iter()
            .filter(move |(_, parent)| parent.as_str() == parent_table)
            .map(|(column, _)| column.as_str())
    }

    /// Returns true if this type declares `parent_table` as a parent.
    pub fn has_parent(&self, parent_table: &str) -> bool {
        self.parents.values().any(|p| p == parent_table)
    }
}

/// Builder for [`EntityType`].
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    table: String,
    id_column: String,
    hash_column: Option<String>,
    blob_column: String,
    indexes: BTreeSet<String>,
    parents: BTreeMap<String, String>,
}

impl EntityTypeBuilder {
    fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            hash_column: Some("hash".to_string()),
            blob_column: "data".to_string(),
            indexes: BTreeSet::new(),
            parents: BTreeMap::new(),
        }
    }

    /// Sets the primary key column.
    #[must_use]
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Sets the hash column.
    #[must_use]
    pub fn hash_column(mut self, column: impl Into<String>) -> Self {
        self.hash_column = Some(column.into());
        self
    }

    /// Disables change hashing.
    #[must_use]
    pub fn without_hash(mut self) -> Self {
        self.hash_column = None;
        self
    }

    /// Sets the blob column.
    #[must_use]
    pub fn blob_column(mut self, column: impl Into<String>) -> Self {
        self.blob_column = column.into();
        self
    }

    /// Declares an indexed column.
    #[must_use]
    pub fn index(mut self, column: impl Into<String>) -> Self {
        self.indexes.insert(column.into());
        self
    }

    /// Declares several indexed columns.
    #[must_use]
    pub fn indexes<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Links to `parent_table` through the conventional `_<parent_table>` column.
    #[must_use]
    pub fn parent(self, parent_table: impl Into<String>) -> Self {
        let parent_table = parent_table.into();
        let column = format!("{PARENT_LINK_PREFIX}{parent_table}");
        self.parent_link(column, parent_table)
    }

    /// Links to `parent_table` through `column`.
    #[must_use]
    pub fn parent_link(mut self, column: impl Into<String>, parent_table: impl Into<String>) -> Self {
        self.parents.insert(column.into(), parent_table.into());
        self
    }

    /// Validates and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if a name is empty, the managed
    /// columns collide, or an indexed or link column is a managed column.
    pub fn build(self) -> CoreResult<EntityType> {
        if self.table.is_empty() {
            return Err(CoreError::configuration("table name must not be empty"));
        }
        if self.id_column.is_empty() {
            return Err(CoreError::configuration(format!(
                "id column of '{}' must not be empty",
                self.table
            )));
        }
        if self.blob_column.is_empty() {
            return Err(CoreError::configuration(format!(
                "blob column of '{}' must not be empty",
                self.table
            )));
        }
        if self.id_column == self.blob_column {
            return Err(CoreError::configuration(format!(
                "id and blob column of '{}' are both '{}'",
                self.table, self.id_column
            )));
        }
        if let Some(hash) = &self.hash_column {
            if hash.is_empty() {
                return Err(CoreError::configuration(format!(
                    "hash column of '{}' must not be empty",
                    self.table
                )));
            }
            if *hash == self.id_column || *hash == self.blob_column {
                return Err(CoreError::configuration(format!(
                    "hash column '{hash}' of '{}' collides with the id or blob column",
                    self.table
                )));
            }
        }

        let ty = EntityType {
            table: self.table,
            id_column: self.id_column,
            hash_column: self.hash_column,
            blob_column: self.blob_column,
            indexes: self.indexes,
            parents: self.parents,
        };

        let declared = ty.indexes.iter().chain(ty.parents.keys());
        for column in declared {
            if column.is_empty() {
                return Err(CoreError::configuration(format!(
                    "'{}' declares an empty column name",
                    ty.table
                )));
            }
            if ty.is_protected(column) {
                return Err(CoreError::configuration(format!(
                    "'{}' cannot index or link through managed column '{column}'",
                    ty.table
                )));
            }
        }
        if let Some((column, _)) = ty.parents.iter().find(|(_, parent)| parent.is_empty()) {
            return Err(CoreError::configuration(format!(
                "link column '{column}' of '{}' names no parent",
                ty.table
            )));
        }

        Ok(ty)
    }
}
