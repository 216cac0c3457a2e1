//! Integration tests for stores over an in-memory engine.

use brickstore_core::{
    Environment, Key, RangeQuery, Readiness, Store, StoreConfig, StoreError, Value,
};

fn record(k: &str, v: i64) -> Value {
    Value::record([("k", Value::from(k)), ("v", Value::from(v))])
}

fn field<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).expect("field present")
}

fn ks(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| field(v, "k").as_text().expect("text key").to_string())
        .collect()
}

async fn keyed(env: &Environment) -> Store {
    let store = Store::open(env, StoreConfig::new("people").key("k").index("v"));
    store.ready().await.expect("store opens");
    store
}

#[tokio::test]
async fn keyed_crud() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;

    assert_eq!(store.insert(record("a", 1)).await, Ok(Key::from("a")));
    assert_eq!(store.get("a").await, Ok(Some(record("a", 1))));
    assert_eq!(store.get("zz").await, Ok(None));

    assert_eq!(store.set("a", record("a", 2)).await, Ok(Key::from("a")));
    assert_eq!(store.get("a").await, Ok(Some(record("a", 2))));
    assert_eq!(store.size().await, Ok(1));

    assert_eq!(store.set("b", record("b", 3)).await, Ok(Key::from("b")));
    assert_eq!(store.size().await, Ok(2));

    assert_eq!(store.remove("a").await, Ok(()));
    assert_eq!(store.remove("a").await, Ok(()));
    assert_eq!(store.get("a").await, Ok(None));
    assert_eq!(store.size().await, Ok(1));
}

#[tokio::test]
async fn keyed_insert_errors() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;

    store.insert(record("a", 1)).await.unwrap();
    assert!(matches!(
        store.insert(record("a", 9)).await,
        Err(StoreError::ConstraintViolation { .. })
    ));
    assert_eq!(
        store.insert(Value::record([("v", 1)])).await,
        Err(StoreError::MissingKey { field: "k".into() })
    );
    assert_eq!(
        store.set("b", record("c", 1)).await,
        Err(StoreError::KeyMismatch {
            expected: Key::from("b"),
            found: Key::from("c"),
        })
    );

    // Failures leave the store untouched and usable.
    assert_eq!(store.get("a").await, Ok(Some(record("a", 1))));
    assert_eq!(store.size().await, Ok(1));
    assert_eq!(store.insert(record("b", 2)).await, Ok(Key::from("b")));
}

#[tokio::test]
async fn keyless_crud() {
    let env = Environment::in_memory().unwrap();
    let store = Store::open(&env, StoreConfig::new("notes"));

    let first = store.insert(Value::from("one")).await.unwrap();
    let second = store.insert(Value::from("two")).await.unwrap();
    assert_eq!(first, Key::Integer(1));
    assert_eq!(second, Key::Integer(2));

    assert_eq!(store.set(first.clone(), Value::from("uno")).await, Ok(first.clone()));
    assert_eq!(store.get(first.clone()).await, Ok(Some(Value::from("uno"))));

    assert_eq!(store.set(10, Value::from("ten")).await, Ok(Key::Integer(10)));
    assert_eq!(store.insert(Value::from("next")).await, Ok(Key::Integer(11)));

    store.remove(second.clone()).await.unwrap();
    assert_eq!(store.get(second).await, Ok(None));
    assert_eq!(
        store.get_all().await,
        Ok(vec![Value::from("uno"), Value::from("ten"), Value::from("next")])
    );
}

#[tokio::test]
async fn insert_many_commits_siblings_of_a_duplicate() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;
    store.insert(record("b", 0)).await.unwrap();

    let results = store
        .insert_many(vec![
            record("a", 1),
            record("b", 2),
            Value::record([("v", 3)]),
            record("c", 4),
        ])
        .await
        .unwrap();

    assert_eq!(results[0], Ok(Key::from("a")));
    assert!(matches!(results[1], Err(StoreError::ConstraintViolation { .. })));
    assert_eq!(results[2], Err(StoreError::MissingKey { field: "k".into() }));
    assert_eq!(results[3], Ok(Key::from("c")));

    assert_eq!(store.size().await, Ok(3));
    assert_eq!(store.get("b").await, Ok(Some(record("b", 0))));
    assert_eq!(store.insert_many(Vec::new()).await, Ok(Vec::new()));
}

#[tokio::test]
async fn get_many_orders_and_pages() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;
    for (k, v) in [("d", 1), ("a", 4), ("c", 2), ("b", 3), ("e", 2)] {
        store.insert(record(k, v)).await.unwrap();
    }

    // Default order is the key field.
    let all = store.get_all().await.unwrap();
    assert_eq!(ks(&all), vec!["a", "b", "c", "d", "e"]);

    let by_v = store.get_many(RangeQuery::new().orderby("v")).await.unwrap();
    assert_eq!(ks(&by_v), vec!["d", "c", "e", "b", "a"]);

    let reversed = store
        .get_many(RangeQuery::new().orderby("v").reverse(true))
        .await
        .unwrap();
    assert_eq!(ks(&reversed), vec!["a", "b", "e", "c", "d"]);

    let bounded = store
        .get_many(RangeQuery::new().orderby("v").start(2).end(3))
        .await
        .unwrap();
    assert_eq!(ks(&bounded), vec!["c", "e", "b"]);

    let page = store
        .get_many(RangeQuery::new().offset(1).count(2))
        .await
        .unwrap();
    assert_eq!(ks(&page), vec!["b", "c"]);

    let tail = store
        .get_many(RangeQuery::new().start("c").offset(1).count(10))
        .await
        .unwrap();
    assert_eq!(ks(&tail), vec!["d", "e"]);

    let upper = store.get_many(RangeQuery::new().end("b")).await.unwrap();
    assert_eq!(ks(&upper), vec!["a", "b"]);

    assert_eq!(store.get_many(RangeQuery::new().count(0)).await, Ok(Vec::new()));
    assert_eq!(
        store.get_many(RangeQuery::new().offset(10)).await,
        Ok(Vec::new())
    );
}

#[tokio::test]
async fn get_many_orders_float_fields() {
    let env = Environment::in_memory().unwrap();
    let store = Store::open(&env, StoreConfig::new("items").key("k").index("price"));
    let item = |k: &str, price: Value| Value::record([("k", Value::from(k)), ("price", price)]);
    store
        .insert_many(vec![
            item("a", Value::Float(9.99)),
            item("b", Value::Integer(3)),
            item("c", Value::Float(-1.5)),
            item("d", Value::Float(3.5)),
            item("e", Value::Float(f64::NAN)),
        ])
        .await
        .unwrap();

    let by_price = store
        .get_many(RangeQuery::new().orderby("price"))
        .await
        .unwrap();
    // NaN is not a key, so "e" is not in the index.
    assert_eq!(ks(&by_price), vec!["c", "b", "d", "a"]);

    let mid = store
        .get_many(RangeQuery::new().orderby("price").start(2.5).end(9.99).reverse(true))
        .await
        .unwrap();
    assert_eq!(ks(&mid), vec!["a", "d", "b"]);
    assert_eq!(field(&mid[0], "price"), &Value::Float(9.99));

    // Float keys address records, and an integral float matches an integer key.
    let floats = Store::open(&env, StoreConfig::new("by_price").key("price"));
    floats.insert(item("p", Value::Float(0.25))).await.unwrap();
    assert_eq!(floats.get(0.25).await.unwrap(), Some(item("p", Value::Float(0.25))));
    floats.insert(item("q", Value::Integer(2))).await.unwrap();
    assert!(matches!(
        floats.insert(item("r", Value::Float(2.0))).await,
        Err(StoreError::ConstraintViolation { .. })
    ));
}

#[tokio::test]
async fn get_many_rejects_bad_queries() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;
    assert_eq!(
        store.get_many(RangeQuery::new().orderby("nope")).await,
        Err(StoreError::UnknownIndex {
            name: "nope".into()
        })
    );
    assert_eq!(
        store.get_many(RangeQuery::new().start("z").end("a")).await,
        Err(StoreError::InvalidRange)
    );
}

#[tokio::test]
async fn clear_keeps_store_usable() {
    let env = Environment::in_memory().unwrap();
    let store = keyed(&env).await;
    store
        .insert_many(vec![record("a", 1), record("b", 2)])
        .await
        .unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.size().await, Ok(0));
    assert_eq!(store.get_all().await, Ok(Vec::new()));
    assert_eq!(store.readiness(), Readiness::Ready);

    store.insert(record("a", 1)).await.unwrap();
    let by_v = store.get_many(RangeQuery::new().orderby("v")).await.unwrap();
    assert_eq!(ks(&by_v), vec!["a"]);
}

#[tokio::test]
async fn operations_before_ready_run_in_order() {
    let env = Environment::in_memory().unwrap();
    let store = Store::open(&env, StoreConfig::new("queue").key("k"));
    assert_eq!(store.readiness(), Readiness::Opening);

    let inserted = store.insert(record("a", 1));
    let replaced = store.set("a", record("a", 2));
    let read = store.get("a");
    let size = store.size();

    assert_eq!(read.await, Ok(Some(record("a", 2))));
    assert_eq!(inserted.await, Ok(Key::from("a")));
    assert_eq!(replaced.await, Ok(Key::from("a")));
    assert_eq!(size.await, Ok(1));
}

#[tokio::test]
async fn unavailable_environment_rejects_everything() {
    let store = Store::open(&Environment::unavailable(), StoreConfig::default());
    assert!(matches!(store.readiness(), Readiness::Failed(_)));
    assert!(matches!(
        store.insert(Value::from(1)).await,
        Err(StoreError::StoreUnavailable { .. })
    ));
    assert!(matches!(
        store.get_all().await,
        Err(StoreError::StoreUnavailable { .. })
    ));
    assert!(matches!(
        store.size().await,
        Err(StoreError::StoreUnavailable { .. })
    ));
}

#[tokio::test]
async fn reopen_with_other_layout_fails() {
    let env = Environment::in_memory().unwrap();
    let original = keyed(&env).await;
    original.insert(record("a", 1)).await.unwrap();

    let same = Store::open(&env, StoreConfig::new("people").key("k").index("v"));
    assert_eq!(same.get("a").await, Ok(Some(record("a", 1))));

    let other = Store::open(&env, StoreConfig::new("people").key("k").index("w"));
    let pending = other.get("a");
    assert!(matches!(
        other.ready().await,
        Err(StoreError::SchemaMismatch { .. })
    ));
    assert!(matches!(
        pending.await,
        Err(StoreError::StoreUnavailable { .. })
    ));

    let keyless = Store::open(&env, StoreConfig::new("people").index("v"));
    assert!(matches!(
        keyless.ready().await,
        Err(StoreError::SchemaMismatch { .. })
    ));
}

#[tokio::test]
async fn persistent_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new("people").key("k").index("v");
    {
        let env = Environment::persistent(dir.path(), Default::default()).unwrap();
        let store = Store::open(&env, config.clone());
        store.insert(record("a", 2)).await.unwrap();
        store.insert(record("b", 1)).await.unwrap();
        store.remove("a").await.unwrap();
        store.insert(record("c", 0)).await.unwrap();
    }

    let env = Environment::persistent(dir.path(), Default::default()).unwrap();
    let store = Store::open(&env, config);
    let by_v = store.get_many(RangeQuery::new().orderby("v")).await.unwrap();
    assert_eq!(ks(&by_v), vec!["c", "b"]);
    assert_eq!(store.size().await, Ok(2));
}
