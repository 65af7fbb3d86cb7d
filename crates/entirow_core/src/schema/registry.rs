//! Registry of entity types.

use crate::error::{CoreError, CoreResult};
use crate::schema::EntityType;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A child type together with its columns that link to one parent type.
#[derive(Debug, Clone)]
pub struct ChildLink {
    /// The child entity type.
    pub child: Arc<EntityType>,
    /// Columns of the child holding the parent's id.
    pub columns: Vec<String>,
}

/// The set of registered entity types.
///
/// Edges of the schema graph run child -> parent and are read from each
/// type's parent links. A type is registered once; registering the same
/// table again is an error.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: RwLock<BTreeMap<String, Arc<EntityType>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is already registered.
    pub fn register(&self, ty: EntityType) -> CoreResult<Arc<EntityType>> {
        let mut types = self.types.write();
        if types.contains_key(ty.table()) {
            return Err(CoreError::configuration(format!(
                "entity type '{}' is already registered",
                ty.table()
            )));
        }
        let ty = Arc::new(ty);
        types.insert(ty.table().to_string(), Arc::clone(&ty));
        tracing::debug!(table = ty.table(), "entity type registered");
        Ok(ty)
    }

    /// Looks up a type by table name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the table is not registered.
    pub fn get(&self, table: &str) -> CoreResult<Arc<EntityType>> {
        self.types
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| CoreError::configuration(format!("entity type '{table}' is not registered")))
    }

    /// Returns true if `table` is registered.
    pub fn contains(&self, table: &str) -> bool {
        self.types.read().contains_key(table)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every other registered type that declares `parent` as a parent.
    pub fn children_of(&self, parent: &str) -> Vec<ChildLink> {
        self.types
            .read()
            .values()
            .filter(|ty| ty.table() != parent)
            .filter_map(|ty| {
                let columns: Vec<String> = ty.links_to(parent).map(str::to_string).collect();
                (!columns.is_empty()).then(|| ChildLink {
                    child: Arc::clone(ty),
                    columns,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blog() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry
            .register(EntityType::builder("users").build().unwrap())
            .unwrap();
        registry
            .register(EntityType::builder("posts").parent("users").build().unwrap())
            .unwrap();
        registry
            .register(
                EntityType::builder("comments")
                    .parent("posts")
                    .parent("users")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = blog();
        let err = registry
            .register(EntityType::builder("users").build().unwrap())
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_type_fails() {
        let registry = blog();
        assert!(registry.get("users").is_ok());
        assert!(matches!(
            registry.get("tags"),
            Err(CoreError::Configuration { .. })
        ));
        assert!(!registry.contains("tags"));
    }

    #[test]
    fn children_follow_parent_links() {
        let registry = blog();

        let mut children: Vec<_> = registry
            .children_of("users")
            .into_iter()
            .map(|link| link.child.table().to_string())
            .collect();
        children.sort();
        assert_eq!(children, vec!["comments", "posts"]);

        let of_posts = registry.children_of("posts");
        assert_eq!(of_posts.len(), 1);
        assert_eq!(of_posts[0].columns, vec!["_posts".to_string()]);

        assert!(registry.children_of("comments").is_empty());
    }

    #[test]
    fn self_links_are_not_children() {
        let registry = SchemaRegistry::new();
        registry
            .register(
                EntityType::builder("folders")
                    .parent_link("parent_id", "folders")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(registry.children_of("folders").is_empty());
    }
}
