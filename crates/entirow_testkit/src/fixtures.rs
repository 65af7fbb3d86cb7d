//! Test fixtures and session helpers.
//!
//! Provides a small blog schema over [`InMemoryDriver`]:
//!
//! - `users`: indexed `email`
//! - `posts`: indexed `status`, child of `users`
//! - `comments`: indexed `approved`, child of `posts` and of `users`

use entirow_core::{EntityClass, EntityType, Session, SessionConfig};
use entirow_storage::{Driver, InMemoryDriver};
use std::sync::Arc;

/// Columns of the `users` table, besides the primary key.
pub const USERS_COLUMNS: [&str; 4] = ["email", "name", "hash", "data"];
/// Columns of the `posts` table. `title` is a row column no descriptor indexes.
pub const POSTS_COLUMNS: [&str; 5] = ["status", "title", "_users", "hash", "data"];
/// Columns of the `comments` table.
pub const COMMENTS_COLUMNS: [&str; 5] = ["approved", "_posts", "_users", "hash", "data"];

/// A session with the blog schema registered, and direct access to its
/// driver.
pub struct TestSession {
    /// The driver, for inspecting rows and installing fail points.
    pub driver: Arc<InMemoryDriver>,
    /// The session.
    pub session: Session,
}

impl TestSession {
    /// Creates the blog fixture with the default configuration.
    pub fn blog() -> Self {
        Self::blog_with_config(SessionConfig::default())
    }

    /// Creates the blog fixture with a custom configuration.
    pub fn blog_with_config(config: SessionConfig) -> Self {
        let driver = Arc::new(blog_driver());
        let session = blog_session(Arc::clone(&driver), config);
        Self { driver, session }
    }

    /// Opens a second session over the same driver, with its own identity
    /// maps.
    pub fn reopen(&self) -> Session {
        blog_session(Arc::clone(&self.driver), SessionConfig::default())
    }

    /// Opens a second session over the same driver, registering `overrides`
    /// in place of the blog types with the same table.
    ///
    /// Used to simulate an older or newer schema over existing rows.
    pub fn reopen_with(&self, overrides: Vec<EntityType>) -> Session {
        let shared: Arc<dyn Driver> = self.driver.clone();
        let session = Session::new(shared);
        let replaced: Vec<String> = overrides.iter().map(|t| t.table().to_string()).collect();
        let types = overrides.into_iter().chain(
            blog_types()
                .into_iter()
                .filter(|t| !replaced.iter().any(|r| r == t.table())),
        );
        for ty in types {
            session.register(ty).expect("Failed to register type");
        }
        session
    }

    /// Returns the `users` class.
    pub fn users(&self) -> EntityClass {
        self.class_of("users")
    }

    /// Returns the `posts` class.
    pub fn posts(&self) -> EntityClass {
        self.class_of("posts")
    }

    /// Returns the `comments` class.
    pub fn comments(&self) -> EntityClass {
        self.class_of("comments")
    }

    fn class_of(&self, table: &str) -> EntityClass {
        self.session
            .class(table)
            .expect("blog fixture registers this table")
    }
}

impl std::ops::Deref for TestSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

/// Creates an in-memory driver with the blog tables.
pub fn blog_driver() -> InMemoryDriver {
    let driver = InMemoryDriver::new();
    driver
        .create_table("users", "id", USERS_COLUMNS)
        .expect("Failed to create users");
    driver
        .create_table("posts", "id", POSTS_COLUMNS)
        .expect("Failed to create posts");
    driver
        .create_table("comments", "id", COMMENTS_COLUMNS)
        .expect("Failed to create comments");
    driver
}

/// Registers the blog schema on a new session over `driver`.
pub fn blog_session(driver: Arc<InMemoryDriver>, config: SessionConfig) -> Session {
    let shared: Arc<dyn Driver> = driver;
    let session = Session::with_config(shared, config);
    for ty in blog_types() {
        session.register(ty).expect("Failed to register blog type");
    }
    session
}

/// The blog entity types.
pub fn blog_types() -> Vec<EntityType> {
    vec![
        EntityType::builder("users")
            .index("email")
            .build()
            .expect("valid users type"),
        EntityType::builder("posts")
            .index("status")
            .parent("users")
            .build()
            .expect("valid posts type"),
        EntityType::builder("comments")
            .index("approved")
            .parent("posts")
            .parent("users")
            .build()
            .expect("valid comments type"),
    ]
}

/// Runs a test against a fresh blog fixture.
///
/// # Example
///
/// ```rust
/// use entirow_codec::columns;
/// use entirow_testkit::with_blog;
///
/// with_blog(|blog| {
///     let user = blog.users().create(&columns! { "email" => "a@x" }).unwrap();
///     assert!(blog.cached("users", user.id()).is_some());
/// });
/// ```
pub fn with_blog<F, R>(f: F) -> R
where
    F: FnOnce(&TestSession) -> R,
{
    let blog = TestSession::blog();
    f(&blog)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use entirow_codec::{columns, RowId};

    /// Ids of the rows created by [`cascade_tree`].
    #[derive(Debug, Clone, Copy)]
    pub struct CascadeTree {
        /// The root user.
        pub parent: RowId,
        /// First post of the user; parent of `grandchild`.
        pub child_one: RowId,
        /// Second post of the user.
        pub child_two: RowId,
        /// A comment on `child_one`, also written by `parent`.
        pub grandchild: RowId,
        /// A user with a post, unrelated to the tree.
        pub bystander: RowId,
    }

    /// Creates a user with two posts, a comment on the first post, and an
    /// unrelated user with one post.
    pub fn cascade_tree(blog: &TestSession) -> CascadeTree {
        let users = blog.users();
        let posts = blog.posts();

        let parent = users
            .create(&columns! { "email" => "p@x" })
            .expect("Failed to create parent")
            .id();
        let child_one = posts
            .create(&columns! { "_users" => parent, "status" => "live" })
            .expect("Failed to create first child")
            .id();
        let child_two = posts
            .create(&columns! { "_users" => parent, "status" => "draft" })
            .expect("Failed to create second child")
            .id();
        let grandchild = blog
            .comments()
            .create(&columns! { "_posts" => child_one, "_users" => parent, "body" => "first" })
            .expect("Failed to create grandchild")
            .id();

        let bystander = users
            .create(&columns! { "email" => "b@x" })
            .expect("Failed to create bystander")
            .id();
        posts
            .create(&columns! { "_users" => bystander, "status" => "live" })
            .expect("Failed to create bystander post");

        CascadeTree {
            parent,
            child_one,
            child_two,
            grandchild,
            bystander,
        }
    }

    /// Creates `count` posts for a new user, alternating `status` between
    /// `"a"` and `"b"`.
    pub fn posts_by_status(blog: &TestSession, count: usize) -> Vec<RowId> {
        let user = blog
            .users()
            .create(&columns! { "email" => "author@x" })
            .expect("Failed to create author")
            .id();
        (0..count)
            .map(|i| {
                let status = if i % 2 == 0 { "a" } else { "b" };
                blog.posts()
                    .create(&columns! { "_users" => user, "status" => status })
                    .expect("Failed to create post")
                    .id()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_registers_three_types() {
        let blog = TestSession::blog();
        assert_eq!(blog.registry().len(), 3);
        assert_eq!(
            blog.registry()
                .children_of("users")
                .iter()
                .map(|l| l.child.table().to_string())
                .collect::<Vec<_>>(),
            vec!["comments", "posts"]
        );
    }

    #[test]
    fn cascade_tree_scenario() {
        let blog = TestSession::blog();
        let tree = scenarios::cascade_tree(&blog);

        assert_eq!(blog.driver.row_count("users"), 2);
        assert_eq!(blog.driver.row_count("posts"), 3);
        assert_eq!(blog.driver.row_count("comments"), 1);
        assert_ne!(tree.child_one, tree.child_two);
    }

    #[test]
    fn reopen_has_separate_identity_maps() {
        let blog = TestSession::blog();
        let user = blog.users().create(&entirow_codec::ColumnMap::new()).unwrap();

        let other = blog.reopen();
        assert!(other.cached("users", user.id()).is_none());
        assert!(blog.cached("users", user.id()).is_some());
    }
}
