//! Deferred multi-group query results.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::schema::EntityType;
use crate::session::Session;
use entirow_codec::{ColumnMap, RowId, Value};
use entirow_storage::{Columns, Conditions, QueryOptions};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Options for [`crate::EntityClass::find`] and derived sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Maximum rows per condition group.
    pub limit: Option<usize>,
    /// Return one result instead of a set.
    pub single: bool,
    /// Return the id/hash projection instead of a record.
    pub array: bool,
    /// Extra row columns to include in the projection.
    pub columns: Vec<String>,
}

impl FindOptions {
    /// Options for a deferred multi-result query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a single-result query.
    #[must_use]
    pub fn single() -> Self {
        Self {
            single: true,
            ..Self::default()
        }
    }

    /// Caps the rows read per condition group.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requests the id/hash projection.
    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Adds a row column to the projection.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }
}

/// A lazily evaluated union of condition groups over one entity type.
///
/// Each group is queried on its own and the results are concatenated in
/// group order. A row matching two groups appears twice (as the same
/// record). Building a set performs no I/O; the first call to
/// [`EntitySet::entities`] queries the driver and caches the result.
pub struct EntitySet {
    session: Session,
    ty: Arc<EntityType>,
    groups: Vec<Conditions>,
    options: FindOptions,
    materialized: Mutex<Option<Vec<Entity>>>,
}

impl EntitySet {
    pub(crate) fn new(
        session: Session,
        ty: Arc<EntityType>,
        groups: Vec<Conditions>,
        options: FindOptions,
    ) -> Self {
        Self {
            session,
            ty,
            groups,
            options,
            materialized: Mutex::new(None),
        }
    }

    /// Returns the entity type of the members.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Returns the condition groups.
    pub fn groups(&self) -> &[Conditions] {
        &self.groups
    }

    /// Adds another condition group.
    #[must_use]
    pub fn or(mut self, conditions: Conditions) -> Self {
        self.groups.push(conditions);
        *self.materialized.get_mut() = None;
        self
    }

    /// Caps the rows read per condition group.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        *self.materialized.get_mut() = None;
        self
    }

    /// Returns true once the members have been loaded.
    pub fn is_materialized(&self) -> bool {
        self.materialized.lock().is_some()
    }

    /// Loads and returns the members.
    ///
    /// Only the first call reaches the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a row cannot be turned into a
    /// record.
    pub fn entities(&self) -> CoreResult<Vec<Entity>> {
        let mut materialized = self.materialized.lock();
        if let Some(entities) = materialized.as_ref() {
            return Ok(entities.clone());
        }

        let map = self.session.identity_map(self.ty.table())?;
        let options = self.query_options();
        let mut entities = Vec::new();
        for group in &self.groups {
            let result = self
                .session
                .driver()
                .get(self.ty.table(), &Columns::All, group, &options)?;
            for row in result.rows {
                let id = row_id_of(&self.ty, &row)?;
                entities.push(map.load_from(id, row)?);
            }
        }
        tracing::debug!(
            table = self.ty.table(),
            groups = self.groups.len(),
            members = entities.len(),
            "entity set materialized"
        );

        *materialized = Some(entities.clone());
        Ok(entities)
    }

    /// Returns the id/hash projection of every member, plus any extra
    /// columns named in the options.
    ///
    /// Derived from the loaded members when the set is already materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn to_array(&self) -> CoreResult<Vec<ColumnMap>> {
        let projection = projection(&self.ty, &self.options.columns);

        if let Some(entities) = self.materialized.lock().as_ref() {
            return Ok(entities
                .iter()
                .map(|entity| {
                    projection
                        .iter()
                        .map(|c| (c.clone(), entity.get(c).unwrap_or(Value::Null)))
                        .collect()
                })
                .collect());
        }

        let columns = Columns::Only(projection);
        let options = self.query_options();
        let mut rows = Vec::new();
        for group in &self.groups {
            let result = self
                .session
                .driver()
                .get(self.ty.table(), &columns, group, &options)?;
            rows.extend(result.rows);
        }
        Ok(rows)
    }

    /// Returns the number of members, materializing the set.
    ///
    /// # Errors
    ///
    /// See [`EntitySet::entities`].
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.entities()?.len())
    }

    /// Returns true if the set has no members, materializing it.
    ///
    /// # Errors
    ///
    /// See [`EntitySet::entities`].
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Sets one column on every member.
    ///
    /// Each member is written on its own; a failure stops the walk and
    /// leaves earlier members updated.
    ///
    /// # Errors
    ///
    /// Returns the first error from materializing or writing a member.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        for entity in self.entities()? {
            entity.set(column, value.clone())?;
        }
        Ok(())
    }

    /// Sets several columns on every member.
    ///
    /// # Errors
    ///
    /// See [`EntitySet::set`].
    pub fn set_many(&self, changes: &ColumnMap) -> CoreResult<()> {
        for entity in self.entities()? {
            entity.set_many(changes)?;
        }
        Ok(())
    }

    /// The set of `parent_type` records the members link to.
    ///
    /// Builds one condition group per member and link column. Members whose
    /// link is empty contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if the member type has no link to
    /// `parent_type`, or [`CoreError::Configuration`] if it is not registered.
    pub fn parents(&self, parent_type: &str) -> CoreResult<EntitySet> {
        let parent = self.session.entity_type(parent_type)?;
        let links = child_links(&self.ty, &parent)?;

        let mut groups = Vec::new();
        for entity in self.entities()? {
            for link in &links {
                if let Some(id) = entity.get(link).as_ref().and_then(RowId::from_value) {
                    groups.push(by_id(parent.column_id(), id));
                }
            }
        }
        Ok(EntitySet::new(
            self.session.clone(),
            parent,
            groups,
            FindOptions::new(),
        ))
    }

    /// The set of `child_type` records linking to any member and matching
    /// `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if `child_type` has no link to the
    /// member type, or [`CoreError::Configuration`] if it is not registered.
    pub fn children(
        &self,
        child_type: &str,
        conditions: &Conditions,
        options: FindOptions,
    ) -> CoreResult<EntitySet> {
        let child = self.session.entity_type(child_type)?;
        let links = child_links(&child, &self.ty)?;

        let mut groups = Vec::new();
        for entity in self.entities()? {
            for link in &links {
                let mut group = conditions.clone();
                group.insert(link.clone(), Value::from(entity.id()));
                groups.push(group);
            }
        }
        Ok(EntitySet::new(self.session.clone(), child, groups, options))
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            limit: self.options.limit,
            single: false,
        }
    }

}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySet")
            .field("table", &self.ty.table())
            .field("groups", &self.groups)
            .field("options", &self.options)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

/// The id and hash columns followed by `extra`.
pub(crate) fn projection(ty: &EntityType, extra: &[String]) -> Vec<String> {
    let mut columns = vec![ty.column_id().to_string()];
    if let Some(hash) = ty.column_hash() {
        columns.push(hash.to_string());
    }
    for column in extra {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}

/// Reads the id out of a row returned by the driver.
pub(crate) fn row_id_of(ty: &EntityType, row: &ColumnMap) -> CoreResult<RowId> {
    row.get(ty.column_id())
        .and_then(RowId::from_value)
        .ok_or_else(|| {
            CoreError::schema(format!(
                "row of '{}' carries no valid '{}'",
                ty.table(),
                ty.column_id()
            ))
        })
}

pub(crate) fn by_id(id_column: &str, id: RowId) -> Conditions {
    [(id_column.to_string(), Value::from(id))].into_iter().collect()
}

/// Link columns of `child` that point at `parent`.
pub(crate) fn child_links(child: &EntityType, parent: &EntityType) -> CoreResult<Vec<String>> {
    let links: Vec<String> = child.links_to(parent.table()).map(str::to_string).collect();
    if links.is_empty() {
        return Err(CoreError::schema(format!(
            "'{}' has no parent link to '{}'",
            child.table(),
            parent.table()
        )));
    }
    Ok(links)
}
