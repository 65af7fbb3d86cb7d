//! Session: the owner of a driver, a schema and the identity maps.

use crate::class::EntityClass;
use crate::config::SessionConfig;
use crate::entity::{by_id, child_links, Entity, EntitySet, FindOptions, IdentityMap};
use crate::error::{CoreError, CoreResult};
use crate::schema::{EntityType, SchemaRegistry};
use entirow_codec::{RowId, Value};
use entirow_storage::{Columns, Conditions, Driver, QueryOptions};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A handle to one mapping context.
///
/// A session owns the schema registry and one identity map per registered
/// type. Records loaded through the same session are shared; two sessions
/// over the same driver never share records. Cloning a session is cheap and
/// yields another handle to the same context.
///
/// # Example
///
/// ```rust
/// use entirow_codec::columns;
/// use entirow_core::{EntityType, Session};
/// use entirow_storage::InMemoryDriver;
/// use std::sync::Arc;
///
/// let driver = Arc::new(InMemoryDriver::new());
/// driver.create_table("users", "id", ["email", "hash", "data"]).unwrap();
///
/// let session = Session::new(driver);
/// let users = session
///     .register(EntityType::builder("users").index("email").build().unwrap())
///     .unwrap();
///
/// let ada = users.create(&columns! { "email" => "ada@example.com" }).unwrap();
/// ada.set("name", "Ada").unwrap();
///
/// let again = users.load(ada.id().get()).unwrap();
/// assert_eq!(again.get("name"), Some("Ada".into()));
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    driver: Arc<dyn Driver>,
    registry: SchemaRegistry,
    maps: RwLock<HashMap<String, Arc<IdentityMap>>>,
}

impl Session {
    /// Creates a session with the default configuration.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_config(driver, SessionConfig::default())
    }

    /// Creates a session with a custom configuration.
    pub fn with_config(driver: Arc<dyn Driver>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                driver,
                registry: SchemaRegistry::new(),
                maps: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns the driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.driver
    }

    /// Returns the schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    /// Registers an entity type and returns its class.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is already registered.
    pub fn register(&self, ty: EntityType) -> CoreResult<EntityClass> {
        let ty = self.inner.registry.register(ty)?;
        let map = IdentityMap::new(
            Arc::clone(&ty),
            Arc::clone(&self.inner.driver),
            self.inner.config.identity_map_capacity,
        );
        self.inner
            .maps
            .write()
            .insert(ty.table().to_string(), Arc::new(map));
        Ok(EntityClass::new(self.clone(), ty))
    }

    /// Returns the class of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is not registered.
    pub fn class(&self, table: &str) -> CoreResult<EntityClass> {
        Ok(EntityClass::new(self.clone(), self.entity_type(table)?))
    }

    /// Returns the descriptor of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is not registered.
    pub fn entity_type(&self, table: &str) -> CoreResult<Arc<EntityType>> {
        self.inner.registry.get(table)
    }

    /// Returns the identity map of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is not registered.
    pub fn identity_map(&self, table: &str) -> CoreResult<Arc<IdentityMap>> {
        self.inner
            .maps
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| CoreError::configuration(format!("unknown entity type '{table}'")))
    }

    /// Returns a record if it is currently cached, without loading it.
    pub fn cached(&self, table: &str, id: RowId) -> Option<Entity> {
        self.identity_map(table).ok()?.get(id)
    }

    /// Loads the `parent_type` record that `entity` links to.
    ///
    /// Uses the first link column holding an id when the child has several
    /// links to the same parent type.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Schema`] if the entity's type has no link to `parent_type`
    /// - [`CoreError::RecordNotFound`] if the link is empty or dangling
    pub fn parent(&self, entity: &Entity, parent_type: &str) -> CoreResult<Entity> {
        let parent = self.entity_type(parent_type)?;
        let links = child_links(entity.entity_type(), &parent)?;
        let id = links
            .iter()
            .find_map(|link| entity.get(link).as_ref().and_then(RowId::from_value))
            .ok_or_else(|| {
                CoreError::not_found(
                    parent.table(),
                    format!(
                        "parent of '{}' id {}",
                        entity.entity_type().table(),
                        entity.id()
                    ),
                )
            })?;
        self.identity_map(parent.table())?.load(id)
    }

    /// Returns the `child_type` records linking to `entity` and matching
    /// `conditions`, as a deferred set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if `child_type` has no link to the
    /// entity's type.
    pub fn children(
        &self,
        entity: &Entity,
        child_type: &str,
        conditions: &Conditions,
        options: FindOptions,
    ) -> CoreResult<EntitySet> {
        let child = self.entity_type(child_type)?;
        let groups = child_links(&child, entity.entity_type())?
            .into_iter()
            .map(|link| {
                let mut group = conditions.clone();
                group.insert(link, Value::from(entity.id()));
                group
            })
            .collect();
        Ok(EntitySet::new(self.clone(), child, groups, options))
    }

    /// Drops a deleted record from its identity map.
    pub(crate) fn forget(&self, table: &str, id: RowId) {
        if let Ok(map) = self.identity_map(table) {
            if map.remove(id).is_some() {
                tracing::trace!(table, %id, "evicted deleted record");
            }
        }
    }

    /// Checks that a row still exists, bypassing the identity map.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown or the driver fails.
    pub fn exists(&self, table: &str, id: RowId) -> CoreResult<bool> {
        let ty = self.entity_type(table)?;
        let result = self.inner.driver.get(
            ty.table(),
            &Columns::only([ty.column_id()]),
            &by_id(ty.column_id(), id),
            &QueryOptions::single(),
        )?;
        Ok(!result.is_empty())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("types", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entirow_codec::{columns, ColumnMap};
    use entirow_storage::InMemoryDriver;

    fn blog() -> (Arc<InMemoryDriver>, Session) {
        let driver = Arc::new(InMemoryDriver::new());
        driver.create_table("users", "id", ["hash", "data"]).unwrap();
        driver
            .create_table("posts", "id", ["_users", "hash", "data"])
            .unwrap();
        let shared: Arc<dyn Driver> = driver.clone();
        let session = Session::new(shared);
        session
            .register(EntityType::builder("users").build().unwrap())
            .unwrap();
        session
            .register(EntityType::builder("posts").parent("users").build().unwrap())
            .unwrap();
        (driver, session)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (_driver, session) = blog();
        assert!(matches!(
            session.register(EntityType::builder("users").build().unwrap()),
            Err(CoreError::Configuration { .. })
        ));
        assert!(matches!(
            session.class("nope"),
            Err(CoreError::Configuration { .. })
        ));
    }

    #[test]
    fn sessions_do_not_share_records() {
        let (driver, session) = blog();
        let id = driver.insert("users", &columns! { "data" => "{}" }).unwrap();

        let other = Session::new(driver.clone());
        other
            .register(EntityType::builder("users").build().unwrap())
            .unwrap();

        let a = session.class("users").unwrap().load(id.get()).unwrap();
        let b = other.class("users").unwrap().load(id.get()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        let c = session.clone().class("users").unwrap().load(id.get()).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn parent_and_children() {
        let (driver, session) = blog();
        let users = session.class("users").unwrap();
        let posts = session.class("posts").unwrap();
        let user = users.create(&ColumnMap::new()).unwrap();
        let post = posts.create(&columns! { "_users" => user.id() }).unwrap();
        posts.create(&columns! { "_users" => user.id() }).unwrap();

        let parent = session.parent(&post, "users").unwrap();
        assert!(Arc::ptr_eq(&parent, &user));

        let children = session
            .children(&user, "posts", &ColumnMap::new(), FindOptions::new())
            .unwrap();
        assert_eq!(children.len().unwrap(), 2);

        assert!(session.exists("posts", post.id()).unwrap());
        assert_eq!(driver.row_count("posts"), 2);
    }

    #[test]
    fn parent_of_unlinked_type_is_a_schema_error() {
        let (_driver, session) = blog();
        let user = session
            .class("users")
            .unwrap()
            .create(&ColumnMap::new())
            .unwrap();
        assert!(matches!(
            session.parent(&user, "posts"),
            Err(CoreError::Schema { .. })
        ));
    }
}
