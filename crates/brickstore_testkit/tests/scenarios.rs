//! End-to-end store scenarios.

use brickstore_core::{
    EngineError, Environment, Key, RangeQuery, Readiness, Store, StoreConfig, StoreError, Value,
};
use brickstore_engine::{Connection, Factory, OpenHandlers, RequestHandlers, TransactionMode};
use brickstore_testkit::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;

fn sorted_by_v(records: &[Value]) -> Vec<Value> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.get(VALUE_FIELD).and_then(Value::as_integer));
    sorted
}

#[tokio::test]
async fn two_hundred_records_by_index() {
    let records = random_records(200, 42);
    let store = TestStore::memory(people_config()).await;
    for record in &records {
        store.insert(record.clone()).await.unwrap();
    }
    assert_eq!(store.size().await, Ok(200));

    let expected = sorted_by_v(&records);
    let by_v = store
        .get_many(RangeQuery::new().orderby(VALUE_FIELD))
        .await
        .unwrap();
    assert_eq!(by_v, expected);

    let page = store
        .get_many(RangeQuery::new().orderby(VALUE_FIELD).count(5).offset(25))
        .await
        .unwrap();
    assert_eq!(page, expected[25..30].to_vec());
}

#[tokio::test]
async fn clear_empties_populated_store() {
    let store = scenarios::populated_store(50, 9).await;
    store.clear().await.unwrap();
    assert_eq!(store.size().await, Ok(0));
    assert_eq!(store.get_many(RangeQuery::new()).await, Ok(Vec::new()));
    assert_eq!(store.readiness(), Readiness::Ready);
}

#[tokio::test]
async fn chained_pages_concatenate() {
    let store = scenarios::populated_store(45, 5).await;
    let mut chained = Vec::new();
    for offset in [0, 10, 20] {
        chained.extend(
            store
                .get_many(RangeQuery::new().offset(offset).count(10))
                .await
                .unwrap(),
        );
    }
    let first_thirty = store.get_many(RangeQuery::new().count(30)).await.unwrap();
    assert_eq!(chained, first_thirty);
    assert_eq!(chained.len(), 30);
}

#[tokio::test]
async fn default_order_and_reverse() {
    let store = scenarios::populated_store(30, 11).await;
    let all = store.get_all().await.unwrap();
    let keys: Vec<&Value> = all.iter().filter_map(|r| r.get(KEY_FIELD)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let mut reversed = store
        .get_many(RangeQuery::new().reverse(true))
        .await
        .unwrap();
    reversed.reverse();
    assert_eq!(reversed, all);
}

#[tokio::test]
async fn set_overwrites_idempotently() {
    let store = TestStore::memory(people_config()).await;
    let first = record("a", 1, 0);
    let second = record("a", 2, 1);

    assert_eq!(store.set("a", first.clone()).await, Ok(Key::from("a")));
    assert_eq!(store.get("a").await, Ok(Some(first)));
    assert_eq!(store.set("a", second.clone()).await, Ok(Key::from("a")));
    assert_eq!(store.get("a").await, Ok(Some(second)));
    assert_eq!(store.size().await, Ok(1));
}

#[tokio::test]
async fn keyless_store_orders_by_identifier() {
    let store = TestStore::memory(StoreConfig::new("log").index(VALUE_FIELD)).await;
    let records = random_records(20, 3);
    let mut ids = Vec::new();
    for record in &records {
        ids.push(store.insert(record.clone()).await.unwrap());
    }
    assert_eq!(ids, (1..=20).map(Key::Integer).collect::<Vec<_>>());
    assert_eq!(store.get_all().await, Ok(records.clone()));
    assert_eq!(
        store
            .get_many(RangeQuery::new().start(5).end(7))
            .await
            .unwrap(),
        records[4..7].to_vec()
    );
    assert_eq!(
        store
            .get_many(RangeQuery::new().orderby(VALUE_FIELD))
            .await
            .unwrap(),
        sorted_by_v(&records)
    );
}

#[tokio::test]
async fn operations_queued_before_ready_keep_order() {
    let env = Environment::in_memory().unwrap();
    let store = Store::open(&env, people_config());
    let pending: Vec<_> = (0..10)
        .map(|n| store.insert(record(&format!("k{n}"), n, n)))
        .collect();
    let all = store.get_many(RangeQuery::new().orderby(SEQUENCE_FIELD));

    for (n, result) in pending.into_iter().enumerate() {
        assert_eq!(result.await, Ok(Key::from(format!("k{n}"))));
    }
    let all = all.await.unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn insert_many_with_one_duplicate() {
    let store = scenarios::populated_store(5, 1).await;
    let existing = store.get_many(RangeQuery::new().count(1)).await.unwrap();
    let duplicate = existing[0].clone();

    let results = store
        .insert_many(vec![record("new-1", 1, 100), duplicate, record("new-2", 2, 101)])
        .await
        .unwrap();
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(StoreError::ConstraintViolation { .. })
    ));
    assert!(results[2].is_ok());
    assert_eq!(store.size().await, Ok(7));
}

#[tokio::test]
async fn unavailable_environment() {
    let store = Store::open(&Environment::unavailable(), people_config());
    assert!(matches!(
        store.get("a").await,
        Err(StoreError::StoreUnavailable { .. })
    ));
    assert!(matches!(
        store.get_many(RangeQuery::new()).await,
        Err(StoreError::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn reopen_with_changed_schema_fails() {
    let store = TestStore::file(people_config()).await;
    store.insert(record("a", 1, 0)).await.unwrap();

    let reopened = store.reopen_with(StoreConfig::new("people").key(KEY_FIELD));
    let pending = reopened.size();
    assert!(matches!(
        reopened.ready().await,
        Err(StoreError::SchemaMismatch { .. })
    ));
    assert!(matches!(
        pending.await,
        Err(StoreError::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn persistence_across_restart() {
    let store = TestStore::file(people_config()).await;
    let records = random_records(40, 8);
    store.insert_many(records.clone()).await.unwrap();
    store.remove(record_key(&records[0])).await.unwrap();
    store
        .set(record_key(&records[1]), record(&key_text(&records[1]), 99, 1))
        .await
        .unwrap();

    let store = store.reopen().await;
    assert_eq!(store.size().await, Ok(39));
    assert_eq!(store.get(record_key(&records[0])).await, Ok(None));
    let updated = store.get(record_key(&records[1])).await.unwrap().unwrap();
    assert_eq!(updated.get(VALUE_FIELD), Some(&Value::Integer(99)));

    // Indices are rebuilt from the journal.
    store.insert(record("zzz", 0, 500)).await.unwrap();
    let by_sequence = store
        .get_many(RangeQuery::new().orderby(SEQUENCE_FIELD).reverse(true).count(1))
        .await
        .unwrap();
    assert_eq!(by_sequence[0].get(KEY_FIELD), Some(&Value::from("zzz")));
}

#[tokio::test]
async fn float_fields_survive_restart() {
    let config = StoreConfig::new("items").key(KEY_FIELD).index("price");
    let store = TestStore::file(config).await;
    for (k, price) in [("a", 9.99), ("b", 0.5), ("c", 2.0)] {
        store
            .insert(Value::record([(KEY_FIELD, Value::from(k)), ("price", Value::from(price))]))
            .await
            .unwrap();
    }

    let store = store.reopen().await;
    let by_price = store
        .get_many(RangeQuery::new().orderby("price").start(1.0))
        .await
        .unwrap();
    let prices: Vec<&Value> = by_price.iter().filter_map(|r| r.get("price")).collect();
    assert_eq!(prices, vec![&Value::Float(2.0), &Value::Float(9.99)]);
}

#[tokio::test]
async fn torn_journal_tail_is_discarded() {
    let store = TestStore::file(people_config()).await;
    store.insert(record("a", 1, 0)).await.unwrap();
    store.insert(record("b", 2, 1)).await.unwrap();
    let dir = store.close();

    // A crash in the middle of appending an entry leaves a partial frame.
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.path().join("people.bsj"))
        .unwrap();
    file.write_all(b"BSJL\x01\x00\x02\xff\x00\x00\x00partial")
        .unwrap();
    drop(file);

    let store = TestStore::open_in(dir, people_config());
    store.ready().await.unwrap();
    assert_eq!(store.size().await, Ok(2));

    // Later appends land after the last complete entry.
    store.insert(record("c", 3, 2)).await.unwrap();
    let store = store.reopen().await;
    let keys: Vec<Value> = store
        .get_all()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.get(KEY_FIELD).cloned())
        .collect();
    assert_eq!(keys, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
}

#[tokio::test]
async fn aborted_engine_transaction_leaves_store_unchanged() {
    let factory = Factory::in_memory().unwrap();
    let store = Store::open(&Environment::new(factory.clone()), people_config());
    store.insert(record("a", 1, 0)).await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    factory.open(
        "people",
        1,
        OpenHandlers::new(RequestHandlers::new(
            move |conn: Connection| {
                let _ = tx.send(conn);
            },
            |event| panic!("open failed: {}", event.error()),
        )),
    );
    let conn = rx.await.unwrap();
    let txn = conn
        .transaction("people", TransactionMode::ReadWrite)
        .unwrap();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    txn.on_complete(move |outcome| {
        let _ = done_tx.send(outcome);
    });
    let objects = txn.object_store();
    objects.put(record("b", 2, 1), None, RequestHandlers::ignore());
    objects.clear(RequestHandlers::ignore());
    txn.abort();
    drop(objects);
    drop(txn);

    assert!(matches!(
        done_rx.await.unwrap(),
        Err(EngineError::Aborted { .. })
    ));
    assert_eq!(store.size().await, Ok(1));
    assert_eq!(store.get("a").await, Ok(Some(record("a", 1, 0))));
    assert_eq!(store.get("b").await, Ok(None));
}

fn key_text(record: &Value) -> String {
    record
        .get(KEY_FIELD)
        .and_then(Value::as_text)
        .expect("generated records have text keys")
        .to_string()
}

fn record_key(record: &Value) -> Key {
    Key::from(key_text(record))
}
