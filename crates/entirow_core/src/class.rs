//! Per-type entry point: load, find, create, delete.

use crate::cascade::{CascadeDeleter, DeletedRow};
use crate::entity::{by_id, projection, row_id_of, Entity, EntitySet, FindOptions};
use crate::error::{row_id, CoreError, CoreResult};
use crate::schema::EntityType;
use crate::session::Session;
use crate::transaction::in_transaction;
use entirow_codec::{ColumnMap, RowId, Value, EMPTY_BLOB};
use entirow_storage::{Columns, Conditions, QueryOptions};
use std::sync::Arc;

/// Result of [`EntityClass::find`].
#[derive(Debug)]
pub enum Found {
    /// A single record.
    Entity(Entity),
    /// A single id/hash projection.
    Row(ColumnMap),
    /// A deferred multi-result query.
    Set(EntitySet),
}

impl Found {
    /// Returns the record, if this is one.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Found::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Returns the projection, if this is one.
    pub fn into_row(self) -> Option<ColumnMap> {
        match self {
            Found::Row(row) => Some(row),
            _ => None,
        }
    }

    /// Returns the set, if this is one.
    pub fn into_set(self) -> Option<EntitySet> {
        match self {
            Found::Set(set) => Some(set),
            _ => None,
        }
    }
}

/// Operations on one registered entity type.
///
/// Obtained from [`Session::register`] or [`Session::class`]. Cheap to
/// clone; every clone shares the session's identity map.
#[derive(Debug, Clone)]
pub struct EntityClass {
    session: Session,
    ty: Arc<EntityType>,
}

impl EntityClass {
    pub(crate) fn new(session: Session, ty: Arc<EntityType>) -> Self {
        Self { session, ty }
    }

    /// Returns the descriptor.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Returns the primary key column.
    pub fn column_id(&self) -> &str {
        self.ty.column_id()
    }

    /// Returns the hash column, if any.
    pub fn column_hash(&self) -> Option<&str> {
        self.ty.column_hash()
    }

    /// Loads a record by id through the identity map.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidId`] if `id` is not positive
    /// - [`CoreError::RecordNotFound`] if no row has this id
    pub fn load(&self, id: i64) -> CoreResult<Entity> {
        let id = row_id(id)?;
        self.session.identity_map(self.ty.table())?.load(id)
    }

    /// Queries by equality conditions.
    ///
    /// With [`FindOptions::single`], reads one row and returns it as a record,
    /// or as an id/hash projection when [`FindOptions::array`] is also set.
    /// Otherwise returns an [`EntitySet`] without touching the driver.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if a single-result query
    /// matches nothing.
    pub fn find(&self, conditions: &Conditions, options: FindOptions) -> CoreResult<Found> {
        if !options.single {
            return Ok(Found::Set(self.find_with(conditions, options)));
        }

        let columns = if options.array {
            Columns::Only(projection(&self.ty, &options.columns))
        } else {
            Columns::All
        };
        let row = self
            .session
            .driver()
            .get(self.ty.table(), &columns, conditions, &QueryOptions::single())?
            .into_first()
            .ok_or_else(|| CoreError::not_found(self.ty.table(), describe(conditions)))?;

        if options.array {
            return Ok(Found::Row(row));
        }
        let id = row_id_of(&self.ty, &row)?;
        let entity = self
            .session
            .identity_map(self.ty.table())?
            .load_from(id, row)?;
        Ok(Found::Entity(entity))
    }

    /// Returns the first record matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if nothing matches.
    pub fn find_one(&self, conditions: &Conditions) -> CoreResult<Entity> {
        match self.find(conditions, FindOptions::single())? {
            Found::Entity(entity) => Ok(entity),
            _ => Err(CoreError::not_found(self.ty.table(), describe(conditions))),
        }
    }

    /// Returns the id/hash projection of the first matching row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordNotFound`] if nothing matches.
    pub fn find_row(&self, conditions: &Conditions) -> CoreResult<ColumnMap> {
        match self.find(conditions, FindOptions::single().array())? {
            Found::Row(row) => Ok(row),
            _ => Err(CoreError::not_found(self.ty.table(), describe(conditions))),
        }
    }

    /// Returns a deferred set of every record matching `conditions`.
    pub fn find_all(&self, conditions: &Conditions) -> EntitySet {
        self.find_with(conditions, FindOptions::new())
    }

    fn find_with(&self, conditions: &Conditions, options: FindOptions) -> EntitySet {
        EntitySet::new(
            self.session.clone(),
            Arc::clone(&self.ty),
            vec![conditions.clone()],
            options,
        )
    }

    /// Reads only the stored hash of a row.
    ///
    /// Cheaper than loading the record when checking for remote changes.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Configuration`] if the type has no hash column
    /// - [`CoreError::RecordNotFound`] if no row has this id
    pub fn hash_of(&self, id: i64) -> CoreResult<Value> {
        let id = row_id(id)?;
        let hash = self.ty.column_hash().ok_or_else(|| {
            CoreError::configuration(format!("'{}' has no hash column", self.ty.table()))
        })?;
        let mut row = self
            .session
            .driver()
            .get(
                self.ty.table(),
                &Columns::only([hash]),
                &by_id(self.ty.column_id(), id),
                &QueryOptions::single(),
            )?
            .into_first()
            .ok_or_else(|| CoreError::not_found_id(self.ty.table(), id))?;
        Ok(row.remove(hash).unwrap_or(Value::Null))
    }

    /// Inserts a new row and returns its record.
    ///
    /// Every parent link of the type must be supplied as a positive id. The
    /// insert and the initial write run in one transaction; on failure
    /// nothing is left behind.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Schema`] if a parent link (or, when configured, an
    ///   indexed column) is missing
    /// - any error from [`crate::EntityRecord::set_many`] or the driver
    pub fn create(&self, columns: &ColumnMap) -> CoreResult<Entity> {
        self.check_create(columns)?;

        let map = self.session.identity_map(self.ty.table())?;
        let driver = self.session.driver();
        let mut inserted: Option<RowId> = None;

        let result = in_transaction(driver.as_ref(), || {
            let blob: ColumnMap = [(
                self.ty.column_blob().to_string(),
                Value::from(EMPTY_BLOB),
            )]
            .into_iter()
            .collect();
            let id = driver.insert(self.ty.table(), &blob)?;
            inserted = Some(id);

            let entity = map.load(id)?;
            entity.set_many(columns)?;
            Ok(entity)
        });

        match result {
            Ok(entity) => {
                tracing::debug!(table = self.ty.table(), id = %entity.id(), "entity created");
                Ok(entity)
            }
            Err(e) => {
                if let Some(id) = inserted {
                    map.remove(id);
                }
                Err(e)
            }
        }
    }

    fn check_create(&self, columns: &ColumnMap) -> CoreResult<()> {
        for (link, parent) in self.ty.parent_links() {
            let valid = columns
                .get(link)
                .and_then(RowId::from_value)
                .is_some();
            if !valid {
                return Err(CoreError::schema(format!(
                    "creating '{}' requires '{link}' to hold the id of a '{parent}'",
                    self.ty.table()
                )));
            }
        }
        if self.session.config().require_indexes_on_create {
            if let Some(column) = self
                .ty
                .indexes()
                .iter()
                .find(|c| columns.get(*c).map_or(true, Value::is_null))
            {
                return Err(CoreError::schema(format!(
                    "creating '{}' requires indexed column '{column}'",
                    self.ty.table()
                )));
            }
        }
        Ok(())
    }

    /// Deletes a row together with every row that links to it, transitively.
    ///
    /// Runs in one transaction. Returns the removed rows in deletion order;
    /// removed records are dropped from the identity maps.
    ///
    /// # Errors
    ///
    /// Returns the first driver error; nothing is removed in that case.
    pub fn delete(&self, id: i64) -> CoreResult<Vec<DeletedRow>> {
        let id = row_id(id)?;
        let driver = self.session.driver();
        let deleted = in_transaction(driver.as_ref(), || {
            CascadeDeleter::new(driver.as_ref(), self.session.registry())
                .run(Arc::clone(&self.ty), id)
        })?;

        for row in &deleted {
            self.session.forget(&row.table, row.id);
        }
        tracing::debug!(
            table = self.ty.table(),
            %id,
            removed = deleted.len(),
            "cascade delete committed"
        );
        Ok(deleted)
    }
}

fn describe(conditions: &Conditions) -> String {
    if conditions.is_empty() {
        return "no conditions".to_string();
    }
    conditions
        .iter()
        .map(|(c, v)| format!("{c} = {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use entirow_codec::columns;
    use entirow_storage::{Driver, DriverOp, FailPoint, InMemoryDriver};

    fn session(config: SessionConfig) -> (Arc<InMemoryDriver>, Session) {
        let driver = Arc::new(InMemoryDriver::new());
        driver
            .create_table("users", "id", ["email", "hash", "data"])
            .unwrap();
        driver
            .create_table("posts", "id", ["status", "_users", "hash", "data"])
            .unwrap();
        let shared: Arc<dyn Driver> = driver.clone();
        let session = Session::with_config(shared, config);
        session
            .register(EntityType::builder("users").index("email").build().unwrap())
            .unwrap();
        session
            .register(
                EntityType::builder("posts")
                    .index("status")
                    .parent("users")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        (driver, session)
    }

    #[test]
    fn create_then_load_returns_same_record() {
        let (driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();

        let created = users
            .create(&columns! { "email" => "a@x", "bio" => "hi" })
            .unwrap();
        let loaded = users.load(created.id().get()).unwrap();

        assert!(Arc::ptr_eq(&created, &loaded));
        let row = driver.row("users", created.id()).unwrap();
        assert_eq!(row["email"], Value::from("a@x"));
        assert_eq!(row["data"], Value::from(r#"{"bio":"hi"}"#));
        assert_eq!(row["hash"], created.hash().unwrap());
    }

    #[test]
    fn create_without_parent_link_inserts_nothing() {
        let (driver, session) = session(SessionConfig::default());
        let posts = session.class("posts").unwrap();

        for input in [columns! { "status" => "x" }, columns! { "_users" => 0 }] {
            assert!(matches!(
                posts.create(&input),
                Err(CoreError::Schema { .. })
            ));
        }
        assert_eq!(driver.row_count("posts"), 0);
        assert_eq!(driver.stats().snapshot().inserts, 0);
    }

    #[test]
    fn failing_write_rolls_back_the_insert() {
        let (driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();
        driver.fail_on(FailPoint::new(DriverOp::Update).on_table("users"));

        assert!(matches!(
            users.create(&columns! { "email" => "a@x" }),
            Err(CoreError::Storage(_))
        ));
        assert_eq!(driver.row_count("users"), 0);
        assert!(session.identity_map("users").unwrap().is_empty());
    }

    #[test]
    fn required_indexes_are_checked_when_configured() {
        let (_driver, session) = session(SessionConfig::new().require_indexes_on_create(true));
        let users = session.class("users").unwrap();

        assert!(matches!(
            users.create(&columns! { "bio" => "x" }),
            Err(CoreError::Schema { .. })
        ));
        assert!(users.create(&columns! { "email" => "a@x" }).is_ok());
    }

    #[test]
    fn find_single_and_array() {
        let (_driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();
        let created = users.create(&columns! { "email" => "a@x" }).unwrap();

        let found = users.find_one(&columns! { "email" => "a@x" }).unwrap();
        assert!(Arc::ptr_eq(&found, &created));

        let row = users.find_row(&columns! { "email" => "a@x" }).unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["hash", "id"]);
        assert_eq!(row["id"], Value::from(created.id()));

        let err = users.find_one(&columns! { "email" => "none" }).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn find_without_single_is_deferred() {
        let (driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();
        let reads = driver.stats().reads();

        let found = users.find(&ColumnMap::new(), FindOptions::new()).unwrap();
        assert!(found.into_set().is_some());
        assert_eq!(driver.stats().reads(), reads);
    }

    #[test]
    fn hash_of_reads_stored_hash() {
        let (_driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();
        let created = users.create(&columns! { "email" => "a@x" }).unwrap();

        assert_eq!(
            users.hash_of(created.id().get()).unwrap(),
            created.hash().unwrap()
        );
        assert!(users.hash_of(999).unwrap_err().is_not_found());
        assert!(matches!(
            users.hash_of(-1),
            Err(CoreError::InvalidId { id: -1 })
        ));
    }

    #[test]
    fn delete_cascades_and_evicts() {
        let (driver, session) = session(SessionConfig::default());
        let users = session.class("users").unwrap();
        let posts = session.class("posts").unwrap();
        let user = users.create(&columns! { "email" => "a@x" }).unwrap();
        let post = posts
            .create(&columns! { "_users" => user.id(), "status" => "live" })
            .unwrap();

        let deleted = users.delete(user.id().get()).unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(driver.row_count("users"), 0);
        assert_eq!(driver.row_count("posts"), 0);
        assert!(session.cached("posts", post.id()).is_none());
        assert!(users.load(user.id().get()).unwrap_err().is_not_found());
    }
}
