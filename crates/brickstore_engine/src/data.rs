//! In-memory database state.

use crate::cursor::CursorDirection;
use crate::error::{EngineError, EngineResult};
use crate::index::IndexData;
use crate::key::{is_nonempty, range_bounds, Key, KeyRange};
use crate::schema::{IndexSchema, StoreSchema};
use brickstore_codec::Value;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Records and indexes of one object store.
#[derive(Debug, Clone)]
pub(crate) struct StoreData {
    schema: StoreSchema,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexData>,
    /// Last generated key; the next one is `generator + 1`.
    generator: i64,
}

impl StoreData {
    /// Creates an empty store with empty indexes.
    pub(crate) fn new(schema: StoreSchema) -> Self {
        let indexes = schema
            .indexes
            .values()
            .map(|index| (index.name.clone(), IndexData::new(index.clone())))
            .collect();
        Self {
            schema,
            records: BTreeMap::new(),
            indexes,
            generator: 0,
        }
    }

    pub(crate) fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub(crate) fn generator(&self) -> i64 {
        self.generator
    }

    pub(crate) fn set_generator(&mut self, generator: i64) {
        self.generator = generator;
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn get(&self, key: &Key) -> Option<&Value> {
        self.records.get(key)
    }

    pub(crate) fn index(&self, name: &str) -> EngineResult<&IndexData> {
        self.indexes.get(name).ok_or_else(|| {
            EngineError::not_found(format!(
                "index '{name}' in store '{}'",
                self.schema.name
            ))
        })
    }

    /// Stores `value`, generating a key when `key` is `None`.
    ///
    /// Returns the key and the record it replaced. Nothing changes if an
    /// index constraint fails.
    pub(crate) fn put(
        &mut self,
        value: Value,
        key: Option<Key>,
        no_overwrite: bool,
    ) -> EngineResult<(Key, Option<Value>)> {
        let (key, generator) = self.resolve_key(key)?;

        if no_overwrite && self.records.contains_key(&key) {
            return Err(EngineError::constraint(format!(
                "key {key} already exists in store '{}'",
                self.schema.name
            )));
        }

        let index_keys: Vec<(String, Key)> = self
            .indexes
            .values()
            .filter_map(|index| index.key_for(&value).map(|k| (index.schema().name.clone(), k)))
            .collect();
        for (name, index_key) in &index_keys {
            if let Some(index) = self.indexes.get(name) {
                index.check(index_key, &key)?;
            }
        }

        let previous = self.remove(&key);
        for (name, index_key) in index_keys {
            if let Some(index) = self.indexes.get_mut(&name) {
                index.insert_unchecked(index_key, key.clone());
            }
        }
        self.records.insert(key.clone(), value);
        self.generator = generator;

        Ok((key, previous))
    }

    fn resolve_key(&self, key: Option<Key>) -> EngineResult<(Key, i64)> {
        match key {
            Some(key) => {
                let generator = match key.generator_floor() {
                    Some(n) if self.schema.auto_increment && n > self.generator => n,
                    _ => self.generator,
                };
                Ok((key, generator))
            }
            None if self.schema.auto_increment => {
                let next = self.generator.checked_add(1).ok_or_else(|| {
                    EngineError::constraint(format!(
                        "key generator of store '{}' is exhausted",
                        self.schema.name
                    ))
                })?;
                Ok((Key::Integer(next), next))
            }
            None => Err(EngineError::data(format!(
                "store '{}' has no key generator and no key was given",
                self.schema.name
            ))),
        }
    }

    /// Removes a record and its index entries.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Value> {
        let previous = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            if let Some(index_key) = index.key_for(&previous) {
                index.remove(&index_key, key);
            }
        }
        Some(previous)
    }

    /// Removes every record whose key lies in `range`.
    pub(crate) fn delete_range(&mut self, range: &KeyRange) -> Vec<(Key, Value)> {
        let keys = self.keys_in(Some(range));
        keys.into_iter()
            .filter_map(|key| self.remove(&key).map(|value| (key, value)))
            .collect()
    }

    /// Removes every record. Returns them for undo.
    pub(crate) fn clear(&mut self) -> BTreeMap<Key, Value> {
        for index in self.indexes.values_mut() {
            index.clear();
        }
        std::mem::take(&mut self.records)
    }

    /// Puts `key` back to `previous` (or removes it if `None`).
    ///
    /// Used to undo writes; skips constraint checks because the restored
    /// state was valid before.
    pub(crate) fn restore(&mut self, key: Key, previous: Option<Value>) {
        self.remove(&key);
        if let Some(value) = previous {
            self.insert_unchecked(key, value);
        }
    }

    /// Replaces all records, rebuilding the indexes.
    pub(crate) fn restore_all(&mut self, records: BTreeMap<Key, Value>) {
        self.clear();
        for (key, value) in records {
            self.insert_unchecked(key, value);
        }
    }

    fn insert_unchecked(&mut self, key: Key, value: Value) {
        for index in self.indexes.values_mut() {
            if let Some(index_key) = index.key_for(&value) {
                index.insert_unchecked(index_key, key.clone());
            }
        }
        self.records.insert(key, value);
    }

    /// Number of records whose key lies in `range`.
    pub(crate) fn count(&self, range: Option<&KeyRange>) -> u64 {
        if range.is_none() {
            return self.len() as u64;
        }
        let (lower, upper) = range_bounds(range);
        if !is_nonempty(lower, upper) {
            return 0;
        }
        self.records.range::<Key, _>((lower, upper)).count() as u64
    }

    fn keys_in(&self, range: Option<&KeyRange>) -> Vec<Key> {
        let (lower, upper) = range_bounds(range);
        if !is_nonempty(lower, upper) {
            return Vec::new();
        }
        self.records
            .range::<Key, _>((lower, upper))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Next record key in `direction`, strictly past `after` if given.
    pub(crate) fn step(
        &self,
        range: Option<&KeyRange>,
        after: Option<&Key>,
        direction: CursorDirection,
    ) -> Option<Key> {
        let (mut lower, mut upper) = range_bounds(range);
        match (direction, after) {
            (CursorDirection::Next, Some(after)) => lower = Bound::Excluded(after),
            (CursorDirection::Prev, Some(after)) => upper = Bound::Excluded(after),
            (_, None) => {}
        }
        if !is_nonempty(lower, upper) {
            return None;
        }
        let mut entries = self.records.range::<Key, _>((lower, upper));
        let entry = match direction {
            CursorDirection::Next => entries.next(),
            CursorDirection::Prev => entries.next_back(),
        };
        entry.map(|(key, _)| key.clone())
    }

    /// Adds an index and fills it from existing records.
    pub(crate) fn create_index(&mut self, schema: IndexSchema) -> EngineResult<()> {
        if self.indexes.contains_key(&schema.name) {
            return Err(EngineError::constraint(format!(
                "index '{}' already exists in store '{}'",
                schema.name, self.schema.name
            )));
        }
        let mut index = IndexData::new(schema.clone());
        for (key, value) in &self.records {
            if let Some(index_key) = index.key_for(value) {
                index.insert(index_key, key.clone())?;
            }
        }
        self.indexes.insert(schema.name.clone(), index);
        self.schema.indexes.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub(crate) fn delete_index(&mut self, name: &str) -> EngineResult<()> {
        if self.indexes.remove(name).is_none() {
            return Err(EngineError::not_found(format!(
                "index '{name}' in store '{}'",
                self.schema.name
            )));
        }
        self.schema.indexes.remove(name);
        Ok(())
    }
}

/// Everything a database holds in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub(crate) version: u32,
    pub(crate) stores: BTreeMap<String, StoreData>,
}

impl DatabaseState {
    pub(crate) fn store(&self, name: &str) -> EngineResult<&StoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("object store '{name}'")))
    }

    pub(crate) fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("object store '{name}'")))
    }

    pub(crate) fn schemas(&self) -> Vec<StoreSchema> {
        self.stores.values().map(|s| s.schema().clone()).collect()
    }

    pub(crate) fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Reconciles the store set with `schemas`, keeping the records of
    /// stores that survive.
    pub(crate) fn apply_schema(&mut self, version: u32, schemas: Vec<StoreSchema>) -> EngineResult<()> {
        self.stores
            .retain(|name, _| schemas.iter().any(|s| &s.name == name));
        for schema in schemas {
            match self.stores.get_mut(&schema.name) {
                Some(store) => {
                    let stale: Vec<String> = store
                        .schema()
                        .index_names()
                        .filter(|name| !schema.indexes.contains_key(*name))
                        .map(str::to_string)
                        .collect();
                    for name in stale {
                        store.delete_index(&name)?;
                    }
                    for index in schema.indexes.values() {
                        if store.schema().index(&index.name).is_none() {
                            store.create_index(index.clone())?;
                        }
                    }
                }
                None => {
                    self.stores.insert(schema.name.clone(), StoreData::new(schema));
                }
            }
        }
        self.version = version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_store() -> StoreData {
        let mut schema = StoreSchema::new("people", false);
        schema
            .indexes
            .insert("by_k".into(), IndexSchema::new("by_k", "k", true));
        schema
            .indexes
            .insert("by_v".into(), IndexSchema::new("by_v", "v", false));
        StoreData::new(schema)
    }

    fn person(k: &str, v: i64) -> Value {
        Value::record([("k", Value::from(k)), ("v", Value::from(v))])
    }

    #[test]
    fn generated_keys_increase() {
        let mut store = StoreData::new(StoreSchema::new("s", true));
        let (a, _) = store.put(Value::from(1), None, false).unwrap();
        let (b, _) = store.put(Value::from(2), None, false).unwrap();
        assert_eq!(a, Key::Integer(1));
        assert_eq!(b, Key::Integer(2));
    }

    #[test]
    fn explicit_integer_key_advances_generator() {
        let mut store = StoreData::new(StoreSchema::new("s", true));
        store.put(Value::from(1), Some(Key::Integer(10)), false).unwrap();
        let (next, _) = store.put(Value::from(2), None, false).unwrap();
        assert_eq!(next, Key::Integer(11));

        store.put(Value::from(3), Some(Key::Integer(4)), false).unwrap();
        let (next, _) = store.put(Value::from(4), None, false).unwrap();
        assert_eq!(next, Key::Integer(12));

        store.put(Value::from(5), Some(Key::Float(20.5)), false).unwrap();
        let (next, _) = store.put(Value::from(6), None, false).unwrap();
        assert_eq!(next, Key::Integer(21));
    }

    #[test]
    fn missing_key_without_generator_fails() {
        let mut store = StoreData::new(StoreSchema::new("s", false));
        let err = store.put(Value::from(1), None, false).unwrap_err();
        assert!(matches!(err, EngineError::Data { .. }));
    }

    #[test]
    fn add_refuses_existing_key() {
        let mut store = keyed_store();
        store.put(person("a", 1), Some(Key::Integer(1)), true).unwrap();
        let err = store.put(person("b", 2), Some(Key::Integer(1)), true).unwrap_err();
        assert!(err.is_constraint());
        assert_eq!(store.get(&Key::Integer(1)), Some(&person("a", 1)));
    }

    #[test]
    fn unique_violation_leaves_store_untouched() {
        let mut store = keyed_store();
        store.put(person("a", 1), Some(Key::Integer(1)), false).unwrap();
        store.put(person("b", 2), Some(Key::Integer(2)), false).unwrap();

        let err = store.put(person("a", 9), Some(Key::Integer(2)), false).unwrap_err();
        assert!(err.is_constraint());
        assert_eq!(store.get(&Key::Integer(2)), Some(&person("b", 2)));
        assert_eq!(store.index("by_k").unwrap().len(), 2);
    }

    #[test]
    fn overwrite_reindexes() {
        let mut store = keyed_store();
        store.put(person("a", 1), Some(Key::Integer(1)), false).unwrap();
        let (_, previous) = store.put(person("z", 5), Some(Key::Integer(1)), false).unwrap();
        assert_eq!(previous, Some(person("a", 1)));

        let by_k = store.index("by_k").unwrap();
        assert_eq!(by_k.first(&Key::from("a")), None);
        assert_eq!(by_k.first(&Key::from("z")), Some(&Key::Integer(1)));
    }

    #[test]
    fn restore_undoes_put_and_delete() {
        let mut store = keyed_store();
        store.put(person("a", 1), Some(Key::Integer(1)), false).unwrap();

        let (key, previous) = store.put(person("b", 2), Some(Key::Integer(1)), false).unwrap();
        store.restore(key, previous);
        assert_eq!(store.get(&Key::Integer(1)), Some(&person("a", 1)));

        let removed = store.remove(&Key::Integer(1));
        store.restore(Key::Integer(1), removed);
        assert_eq!(store.index("by_k").unwrap().first(&Key::from("a")), Some(&Key::Integer(1)));
    }

    #[test]
    fn clear_and_restore_all() {
        let mut store = keyed_store();
        for n in 0..5 {
            store
                .put(person(&format!("k{n}"), n), Some(Key::Integer(n)), false)
                .unwrap();
        }
        let old = store.clear();
        assert_eq!(store.len(), 0);
        assert_eq!(store.index("by_v").unwrap().len(), 0);

        store.restore_all(old);
        assert_eq!(store.len(), 5);
        assert_eq!(store.index("by_v").unwrap().len(), 5);
    }

    #[test]
    fn count_and_delete_range() {
        let mut store = StoreData::new(StoreSchema::new("s", true));
        for _ in 0..10 {
            store.put(Value::Null, None, false).unwrap();
        }
        let range = KeyRange::bound(3, 5, false, false).unwrap();
        assert_eq!(store.count(Some(&range)), 3);
        assert_eq!(store.count(None), 10);

        let removed = store.delete_range(&range);
        assert_eq!(removed.len(), 3);
        assert_eq!(store.count(None), 7);
    }

    #[test]
    fn step_both_directions() {
        let mut store = StoreData::new(StoreSchema::new("s", true));
        for _ in 0..3 {
            store.put(Value::Null, None, false).unwrap();
        }
        assert_eq!(store.step(None, None, CursorDirection::Next), Some(Key::Integer(1)));
        assert_eq!(
            store.step(None, Some(&Key::Integer(1)), CursorDirection::Next),
            Some(Key::Integer(2))
        );
        assert_eq!(store.step(None, None, CursorDirection::Prev), Some(Key::Integer(3)));
        assert_eq!(
            store.step(None, Some(&Key::Integer(1)), CursorDirection::Prev),
            None
        );
    }

    #[test]
    fn create_index_backfills_and_checks_uniqueness() {
        let mut store = StoreData::new(StoreSchema::new("s", true));
        store.put(person("a", 1), None, false).unwrap();
        store.put(person("a", 2), None, false).unwrap();

        store
            .create_index(IndexSchema::new("by_v", "v", true))
            .unwrap();
        assert_eq!(store.index("by_v").unwrap().len(), 2);

        let err = store
            .create_index(IndexSchema::new("by_k", "k", true))
            .unwrap_err();
        assert!(err.is_constraint());
        assert!(store.schema().index("by_k").is_none());
    }

    #[test]
    fn apply_schema_reconciles() {
        let mut state = DatabaseState::default();
        let mut people = StoreSchema::new("people", false);
        people
            .indexes
            .insert("by_k".into(), IndexSchema::new("by_k", "k", true));
        state
            .apply_schema(1, vec![people.clone(), StoreSchema::new("old", true)])
            .unwrap();
        assert_eq!(state.store_names(), vec!["old".to_string(), "people".to_string()]);

        people.indexes.clear();
        state.apply_schema(2, vec![people]).unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.store_names(), vec!["people".to_string()]);
        assert!(state.store("people").unwrap().index("by_k").is_err());
    }
}
