//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random column maps that are valid
//! input to `set` on the blog fixture.

use entirow_codec::{ColumnMap, Value};
use proptest::prelude::*;

/// Strategy for column names that land in the blob of every blog type.
///
/// Never produces a managed column (`id`, `hash`, `data`), an indexed
/// column, or a `_`-prefixed link column.
pub fn blob_column_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,11}")
        .expect("Invalid regex")
        .prop_filter("managed or indexed column", |name| {
            !matches!(
                name.as_str(),
                "id" | "hash" | "data" | "email" | "status" | "approved"
            )
        })
}

/// Strategy for non-null storable values.
pub fn stored_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12..1.0e12f64).prop_map(Value::Float),
        prop::string::string_regex("[ -~]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
        any::<bool>().prop_map(Value::from),
    ]
}

/// Strategy for values, including `Null` (a removal).
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => stored_value_strategy(),
        1 => Just(Value::Null),
    ]
}

/// Strategy for a batch of blob changes, up to `max` columns.
pub fn column_map_strategy(max: usize) -> impl Strategy<Value = ColumnMap> {
    prop::collection::btree_map(blob_column_strategy(), value_strategy(), 0..=max)
}

/// Strategy for a post `status`, the indexed column of `posts`.
pub fn status_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::from("draft")),
        Just(Value::from("live")),
        Just(Value::from("archived")),
        Just(Value::Null),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
