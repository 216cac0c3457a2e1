//! Record generators.
//!
//! Records have the shape `{k, v, i}`: `k` a unique text key, `v` a small
//! integer with many duplicates, `i` the generation sequence number.

use brickstore_core::{RangeQuery, Value};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Key field of generated records.
pub const KEY_FIELD: &str = "k";
/// Duplicate-heavy indexed field.
pub const VALUE_FIELD: &str = "v";
/// Sequence field, unique per generated batch.
pub const SEQUENCE_FIELD: &str = "i";

/// Builds a `{k, v, i}` record.
pub fn record(k: &str, v: i64, i: i64) -> Value {
    Value::record([
        (KEY_FIELD, Value::from(k)),
        (VALUE_FIELD, Value::from(v)),
        (SEQUENCE_FIELD, Value::from(i)),
    ])
}

/// `count` records with unique keys in shuffled order and `v` in `0..20`.
///
/// The same seed always yields the same records.
pub fn random_records(count: usize, seed: u64) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys: Vec<String> = (0..count).map(|n| format!("key-{n:05}")).collect();
    keys.shuffle(&mut rng);
    keys.iter()
        .enumerate()
        .map(|(i, k)| record(k, rng.gen_range(0..20), i as i64))
        .collect()
}

/// Strategy for record keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f]{1,4}").expect("Invalid regex")
}

/// Strategy for batches of records with distinct keys.
pub fn records_strategy(max: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::btree_map(key_strategy(), 0i64..8, 0..max)
        .prop_flat_map(|map| {
            let pairs: Vec<(String, i64)> = map.into_iter().collect();
            Just(pairs).prop_shuffle()
        })
        .prop_map(|pairs| {
            pairs
                .iter()
                .enumerate()
                .map(|(i, (k, v))| record(k, *v, i as i64))
                .collect()
        })
}

fn page_strategy() -> impl Strategy<Value = (bool, Option<usize>, Option<usize>)> {
    (any::<bool>(), prop::option::of(0usize..12), prop::option::of(0usize..12))
}

/// Strategy for queries ordered by the key field, with text bounds.
pub fn key_query_strategy() -> impl Strategy<Value = RangeQuery> {
    (
        prop::option::of(key_strategy()),
        prop::option::of(key_strategy()),
        page_strategy(),
    )
        .prop_filter("start must not exceed end", |(start, end, _)| {
            match (start, end) {
                (Some(start), Some(end)) => start <= end,
                _ => true,
            }
        })
        .prop_map(|(start, end, (reverse, count, offset))| RangeQuery {
            orderby: None,
            reverse,
            start: start.map(Into::into),
            end: end.map(Into::into),
            count,
            offset,
        })
}

/// Strategy for queries ordered by the `v` index, with integer bounds.
pub fn index_query_strategy() -> impl Strategy<Value = RangeQuery> {
    (
        prop::option::of(0i64..8),
        prop::option::of(0i64..8),
        page_strategy(),
    )
        .prop_filter("start must not exceed end", |(start, end, _)| {
            match (start, end) {
                (Some(start), Some(end)) => start <= end,
                _ => true,
            }
        })
        .prop_map(|(start, end, (reverse, count, offset))| RangeQuery {
            orderby: Some(VALUE_FIELD.to_string()),
            reverse,
            start: start.map(Into::into),
            end: end.map(Into::into),
            count,
            offset,
        })
}
