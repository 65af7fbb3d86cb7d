//! End-to-end scenarios over the blog fixture.

use entirow_codec::{columns, ColumnMap, RowId, Value};
use entirow_core::{CoreError, EntityType, FindOptions, SessionConfig};
use entirow_storage::{DriverOp, FailPoint};
use entirow_testkit::prelude::*;
use entirow_testkit::scenarios::{cascade_tree, posts_by_status};
use std::sync::Arc;

#[test]
fn cascade_removes_the_whole_tree_in_one_transaction() {
    init_tracing();
    let blog = TestSession::blog();
    let tree = cascade_tree(&blog);
    let before = blog.driver.stats().snapshot();

    let deleted = blog.users().delete(tree.parent.get()).unwrap();

    let mut removed: Vec<_> = deleted.iter().map(|d| (d.table.as_str(), d.id)).collect();
    removed.sort();
    assert_eq!(
        removed,
        vec![
            ("comments", tree.grandchild),
            ("posts", tree.child_one),
            ("posts", tree.child_two),
            ("users", tree.parent),
        ]
    );
    let after = blog.driver.stats().snapshot();
    assert_eq!(after.transactions_started - before.transactions_started, 1);
    assert_eq!(after.transactions_committed - before.transactions_committed, 1);

    for (table, id) in removed {
        assert!(blog.driver.row(table, id).is_none());
        assert!(blog.cached(table, id).is_none());
    }
    assert!(blog.driver.row("users", tree.bystander).is_some());
    assert_eq!(blog.driver.row_count("posts"), 1);
}

#[test]
fn cascade_failure_at_depth_removes_nothing() {
    init_tracing();
    let blog = TestSession::blog();
    let tree = cascade_tree(&blog);
    blog.driver
        .fail_on(FailPoint::new(DriverOp::Delete).on_table("comments").on_id(tree.grandchild));

    let err = blog.users().delete(tree.parent.get()).unwrap_err();

    assert!(matches!(err, CoreError::Storage(_)));
    assert!(!blog.driver.in_transaction());
    assert!(blog.driver.row("users", tree.parent).is_some());
    assert!(blog.driver.row("posts", tree.child_one).is_some());
    assert!(blog.driver.row("posts", tree.child_two).is_some());
    assert!(blog.driver.row("comments", tree.grandchild).is_some());
    // nothing was evicted either
    assert!(blog.cached("posts", tree.child_one).is_some());
}

#[test]
fn create_with_missing_parent_link_leaves_no_row() {
    let blog = TestSession::blog();

    let err = blog
        .posts()
        .create(&columns! { "status" => "draft", "body" => "orphan" })
        .unwrap_err();

    assert!(matches!(err, CoreError::Schema { .. }));
    assert_eq!(blog.driver.row_count("posts"), 0);
    assert_eq!(blog.driver.stats().snapshot().inserts, 0);
}

#[test]
fn create_failure_after_insert_is_rolled_back() {
    let blog = TestSession::blog();
    let user = blog.users().create(&columns! { "email" => "a@x" }).unwrap();

    // a NaN fails validation after the row was inserted
    let err = blog
        .posts()
        .create(&columns! { "_users" => user.id(), "score" => f64::NAN })
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidValue { .. }));
    assert_eq!(blog.driver.row_count("posts"), 0);
    assert!(blog.identity_map("posts").unwrap().is_empty());
}

#[test]
fn two_groups_concatenate_without_dedup() {
    let blog = TestSession::blog();
    let ids = posts_by_status(&blog, 4);

    let set = blog
        .posts()
        .find_all(&columns! { "status" => "a" })
        .or(columns! { "status" => "b" });
    let members: Vec<RowId> = set.entities().unwrap().iter().map(|e| e.id()).collect();
    assert_eq!(members, vec![ids[0], ids[2], ids[1], ids[3]]);

    // a row matching both groups appears twice, as the same record
    let overlapping = blog
        .posts()
        .find_all(&columns! { "status" => "a" })
        .or(ColumnMap::new());
    let entities = overlapping.entities().unwrap();
    assert_eq!(entities.len(), 2 + 4);
    assert!(Arc::ptr_eq(&entities[0], &entities[2]));
}

#[test]
fn reindex_demotes_a_formerly_indexed_column() {
    let blog = TestSession::blog();
    let user = blog.users().create(&columns! { "email" => "a@x" }).unwrap();

    // An older schema indexed `title`.
    let old = blog.reopen_with(vec![
        EntityType::builder("posts")
            .index("status")
            .index("title")
            .parent("users")
            .build()
            .unwrap(),
    ]);
    let post = old
        .class("posts")
        .unwrap()
        .create(&columns! { "_users" => user.id(), "title" => "Hello", "body" => "b" })
        .unwrap();
    assert_eq!(blog.driver.row("posts", post.id()).unwrap()["title"], Value::from("Hello"));

    // The current schema keeps `title` in the blob.
    let current = blog.posts().load(post.id().get()).unwrap();
    current.reindex().unwrap();

    let row = blog.driver.row("posts", post.id()).unwrap();
    assert_eq!(row["title"], Value::Null);
    let blob = entirow_codec::decode_blob(row["data"].as_text().unwrap()).unwrap();
    assert_eq!(blob.get("title"), Some(&Value::from("Hello")));
    assert_eq!(current.get("title"), Some(Value::from("Hello")));
    physical::assert_split(&blog.driver, current.entity_type(), post.id());
    physical::assert_hash(&current);

    let updates = blog.driver.stats().updates();
    current.reindex().unwrap();
    assert_eq!(blog.driver.stats().updates(), updates);
}

#[test]
fn navigation_round_trip() {
    let blog = TestSession::blog();
    let tree = cascade_tree(&blog);
    let comment = blog.comments().load(tree.grandchild.get()).unwrap();

    let post = blog.parent(&comment, "posts").unwrap();
    assert_eq!(post.id(), tree.child_one);
    let author = blog.parent(&post, "users").unwrap();
    assert_eq!(author.id(), tree.parent);

    let drafts = blog
        .children(&author, "posts", &columns! { "status" => "draft" }, FindOptions::new())
        .unwrap();
    let ids: Vec<_> = drafts.entities().unwrap().iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![tree.child_two]);

    let commenters = blog
        .posts()
        .find_all(&columns! { "_users" => tree.parent })
        .children("comments", &ColumnMap::new(), FindOptions::new())
        .unwrap()
        .parents("users")
        .unwrap();
    assert_eq!(commenters.len().unwrap(), 1);
}

#[test]
fn bounded_identity_map_keeps_held_records() {
    let blog = TestSession::blog_with_config(SessionConfig::new().identity_map_capacity(1));
    let ids = posts_by_status(&blog, 3);

    let held = blog.posts().load(ids[0].get()).unwrap();
    for id in &ids[1..] {
        drop(blog.posts().load(id.get()).unwrap());
    }

    let again = blog.posts().load(ids[0].get()).unwrap();
    assert!(Arc::ptr_eq(&held, &again));
    assert!(blog.identity_map("posts").unwrap().len() <= 2);
}

#[test]
fn find_array_projection_includes_requested_columns() {
    let blog = TestSession::blog();
    let ids = posts_by_status(&blog, 2);

    let found = blog
        .posts()
        .find(
            &columns! { "status" => "b" },
            FindOptions::single().array().column("status"),
        )
        .unwrap()
        .into_row()
        .unwrap();

    assert_eq!(found["id"], Value::from(ids[1]));
    assert_eq!(found["status"], Value::from("b"));
    assert!(found.contains_key("hash"));
    assert!(!found.contains_key("data"));
}
