//! Reference model for cross-checking stores.
//!
//! [`Model`] keeps records in a plain vector and answers range queries by
//! sorting and slicing, which is slow but obviously correct.

use brickstore_core::{Key, RangeQuery, StoreConfig, Value};

/// An in-memory model of one store.
#[derive(Debug, Clone)]
pub struct Model {
    key_field: Option<String>,
    records: Vec<(i64, Value)>,
    next_id: i64,
}

impl Model {
    /// An empty model of a store with `config`'s key field.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            key_field: config.key.clone(),
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a record the way `insert` does. Returns false if the store would
    /// reject it.
    pub fn insert(&mut self, record: Value) -> bool {
        if let Some(field) = &self.key_field {
            let Some(key) = field_key(&record, field) else {
                return false;
            };
            let taken = self
                .records
                .iter()
                .any(|(_, existing)| field_key(existing, field).as_ref() == Some(&key));
            if taken {
                return false;
            }
        }
        self.records.push((self.next_id, record));
        self.next_id += 1;
        true
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the model holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes every record. Identifiers keep counting up.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The records `get_many(query)` should return.
    pub fn get_many(&self, query: &RangeQuery) -> Vec<Value> {
        let key_space = query.orderby.as_deref().or(self.key_field.as_deref());
        let mut entries: Vec<(Key, i64, &Value)> = self
            .records
            .iter()
            .filter_map(|(id, record)| {
                let key = match key_space {
                    Some(field) => field_key(record, field)?,
                    None => Key::Integer(*id),
                };
                Some((key, *id, record))
            })
            .filter(|(key, _, _)| {
                query.start.as_ref().map_or(true, |start| key >= start)
                    && query.end.as_ref().map_or(true, |end| key <= end)
            })
            .collect();
        entries.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        if query.reverse {
            entries.reverse();
        }
        entries
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.count.unwrap_or(usize::MAX))
            .map(|(_, _, record)| record.clone())
            .collect()
    }
}

fn field_key(record: &Value, field: &str) -> Option<Key> {
    record.get_path(field).and_then(Key::from_value)
}
