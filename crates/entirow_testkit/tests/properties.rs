//! Property tests for record invariants.

use entirow_codec::{columns, content_hash, ColumnMap, Value};
use entirow_core::CoreError;
use entirow_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn blog_with_post() -> (TestSession, entirow_core::Entity) {
    let blog = TestSession::blog();
    let user = blog.users().create(&columns! { "email" => "a@x" }).unwrap();
    let post = blog
        .posts()
        .create(&columns! { "_users" => user.id(), "status" => "draft" })
        .unwrap();
    (blog, post)
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn loading_twice_yields_the_same_record(extra in column_map_strategy(4)) {
        let (blog, post) = blog_with_post();
        post.set_many(&extra).unwrap();

        let a = blog.posts().load(post.id().get()).unwrap();
        let b = blog.posts().load(post.id().get()).unwrap();
        prop_assert!(Arc::ptr_eq(&a, &b));
        prop_assert!(Arc::ptr_eq(&a, &post));
    }

    #[test]
    fn set_keeps_blob_column_out_and_hash_current(
        batches in prop::collection::vec(column_map_strategy(5), 1..6),
        status in status_strategy(),
    ) {
        let (_blog, post) = blog_with_post();
        for batch in &batches {
            post.set_many(batch).unwrap();
            post.set("status", status.clone()).unwrap();

            let all = post.all();
            prop_assert!(!all.contains_key("data"));
            let mut content = all.clone();
            let hash = content.remove("hash");
            prop_assert_eq!(hash, Some(content_hash(&content).unwrap()));
        }
    }

    #[test]
    fn unchanged_values_cause_no_writes(extra in column_map_strategy(5)) {
        let (blog, post) = blog_with_post();
        post.set_many(&extra).unwrap();
        let writes = blog.driver.stats().writes();

        let current: ColumnMap = post
            .all()
            .into_iter()
            .filter(|(c, _)| c != "id" && c != "hash")
            .collect();
        post.set_many(&current).unwrap();
        post.set_many(&ColumnMap::new()).unwrap();
        for column in extra.keys().filter(|c| post.get(c).is_none()) {
            post.set(column, Value::Null).unwrap();
        }

        prop_assert_eq!(blog.driver.stats().writes(), writes);
    }

    #[test]
    fn reload_matches_memory(
        batches in prop::collection::vec(column_map_strategy(4), 1..5),
        status in status_strategy(),
    ) {
        let mut harness = IntegrationHarness::new();
        let user = harness.create("users", &columns! { "email" => "a@x" });
        let post = harness.create("posts", &columns! { "_users" => user.id() });
        for batch in &batches {
            harness.set(&post, batch);
        }
        harness.set(&post, &columns! { "status" => status });
        harness.verify_all();
    }

    #[test]
    fn protected_columns_are_never_written(
        column in prop_oneof![Just("id"), Just("hash"), Just("data")],
        value in stored_value_strategy(),
    ) {
        let (blog, post) = blog_with_post();
        let writes = blog.driver.stats().writes();

        let err = post.set(column, value).unwrap_err();
        prop_assert!(matches!(err, CoreError::ProtectedColumn { .. }), "unexpected error");
        prop_assert_eq!(blog.driver.stats().writes(), writes);
    }
}
