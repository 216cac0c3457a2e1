//! Property tests comparing stores against the reference model.

use brickstore_core::{RangeQuery, StoreError, Value};
use brickstore_testkit::prelude::*;
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

fn model_of(records: &[Value]) -> Model {
    let mut model = Model::new(&people_config());
    for record in records {
        assert!(model.insert(record.clone()));
    }
    model
}

async fn store_of(records: &[Value]) -> TestStore {
    let store = TestStore::memory(people_config()).await;
    for record in records {
        store.insert(record.clone()).await.unwrap();
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn key_queries_match_model(
        records in records_strategy(24),
        query in key_query_strategy(),
    ) {
        let expected = model_of(&records).get_many(&query);
        let actual = block_on(async {
            let store = store_of(&records).await;
            store.get_many(query.clone()).await
        });
        prop_assert_eq!(actual, Ok(expected));
    }

    #[test]
    fn index_queries_match_model(
        records in records_strategy(24),
        query in index_query_strategy(),
    ) {
        let expected = model_of(&records).get_many(&query);
        let actual = block_on(async {
            let store = store_of(&records).await;
            store.get_many(query.clone()).await
        });
        prop_assert_eq!(actual, Ok(expected));
    }

    #[test]
    fn reverse_is_forward_backwards(
        records in records_strategy(24),
        query in index_query_strategy(),
    ) {
        let forward = RangeQuery { reverse: false, count: None, offset: None, ..query.clone() };
        let backward = RangeQuery { reverse: true, ..forward.clone() };
        let (mut forward, backward) = block_on(async {
            let store = store_of(&records).await;
            (
                store.get_many(forward).await.unwrap(),
                store.get_many(backward).await.unwrap(),
            )
        });
        forward.reverse();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn pages_are_slices_of_the_full_result(
        records in records_strategy(24),
        query in key_query_strategy(),
    ) {
        let full = RangeQuery { count: None, offset: None, ..query.clone() };
        let (all, page) = block_on(async {
            let store = store_of(&records).await;
            (
                store.get_many(full).await.unwrap(),
                store.get_many(query.clone()).await.unwrap(),
            )
        });
        let start = query.offset.unwrap_or(0).min(all.len());
        let end = query
            .count
            .map_or(all.len(), |count| (start + count).min(all.len()));
        prop_assert_eq!(page, all[start..end].to_vec());
    }

    #[test]
    fn second_insert_of_a_key_is_rejected(records in records_strategy(12)) {
        prop_assume!(!records.is_empty());
        let (again, size) = block_on(async {
            let store = store_of(&records).await;
            let again = store.insert(records[0].clone()).await;
            (again, store.size().await)
        });
        prop_assert!(matches!(again, Err(StoreError::ConstraintViolation { .. })), "expected ConstraintViolation");
        prop_assert_eq!(size, Ok(records.len() as u64));
    }
}
