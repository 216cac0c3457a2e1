//! Secondary index storage.

use crate::cursor::CursorDirection;
use crate::error::{EngineError, EngineResult};
use crate::key::{is_nonempty, range_bounds, Key, KeyRange};
use crate::schema::IndexSchema;
use brickstore_codec::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Ordered mapping from index keys to the primary keys holding them.
///
/// Entries are ordered by `(index key, primary key)`, which is the order
/// index cursors walk in. A unique index never holds two primary keys
/// under one index key.
#[derive(Debug, Clone)]
pub(crate) struct IndexData {
    /// Index definition.
    schema: IndexSchema,
    /// Index key to primary keys.
    entries: BTreeMap<Key, BTreeSet<Key>>,
    /// Total entry count.
    count: usize,
}

impl IndexData {
    /// Creates an empty index.
    pub(crate) fn new(schema: IndexSchema) -> Self {
        Self {
            schema,
            entries: BTreeMap::new(),
            count: 0,
        }
    }

    pub(crate) fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Extracts this index's key from a record.
    ///
    /// Records whose field is missing or not a valid key are not indexed.
    pub(crate) fn key_for(&self, record: &Value) -> Option<Key> {
        record
            .get_path(&self.schema.key_path)
            .and_then(Key::from_value)
    }

    /// Fails if inserting `key` for `primary` would break uniqueness.
    pub(crate) fn check(&self, key: &Key, primary: &Key) -> EngineResult<()> {
        if !self.schema.unique {
            return Ok(());
        }
        match self.entries.get(key) {
            Some(existing) if existing.iter().any(|p| p != primary) => {
                Err(EngineError::constraint(format!(
                    "index '{}' already contains key {key}",
                    self.schema.name
                )))
            }
            _ => Ok(()),
        }
    }

    /// Adds an entry after checking uniqueness.
    pub(crate) fn insert(&mut self, key: Key, primary: Key) -> EngineResult<()> {
        self.check(&key, &primary)?;
        self.insert_unchecked(key, primary);
        Ok(())
    }

    /// Adds an entry without checking uniqueness.
    ///
    /// Only used to restore a state that was valid before.
    pub(crate) fn insert_unchecked(&mut self, key: Key, primary: Key) {
        if self.entries.entry(key).or_default().insert(primary) {
            self.count += 1;
        }
    }

    /// Removes an entry. Returns true if it existed.
    pub(crate) fn remove(&mut self, key: &Key, primary: &Key) -> bool {
        let Some(set) = self.entries.get_mut(key) else {
            return false;
        };
        if !set.remove(primary) {
            return false;
        }
        self.count -= 1;
        if set.is_empty() {
            self.entries.remove(key);
        }
        true
    }

    /// Lowest primary key filed under `key`.
    pub(crate) fn first(&self, key: &Key) -> Option<&Key> {
        self.entries.get(key).and_then(|set| set.iter().next())
    }

    /// Number of entries whose index key lies in `range`.
    pub(crate) fn count_in(&self, range: Option<&KeyRange>) -> u64 {
        if range.is_none() {
            return self.len() as u64;
        }
        let (lower, upper) = range_bounds(range);
        if !is_nonempty(lower, upper) {
            return 0;
        }
        self.entries
            .range::<Key, _>((lower, upper))
            .map(|(_, set)| set.len() as u64)
            .sum()
    }

    /// Total number of entries.
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }

    /// Next `(index key, primary key)` position in `direction`.
    ///
    /// With `after` set, returns the position strictly following it;
    /// otherwise the first position of the range.
    pub(crate) fn step(
        &self,
        range: Option<&KeyRange>,
        after: Option<(&Key, &Key)>,
        direction: CursorDirection,
    ) -> Option<(Key, Key)> {
        let (lower, upper) = range_bounds(range);
        match direction {
            CursorDirection::Next => self.step_forward(lower, upper, after),
            CursorDirection::Prev => self.step_backward(lower, upper, after),
        }
    }

    fn step_forward(
        &self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        after: Option<(&Key, &Key)>,
    ) -> Option<(Key, Key)> {
        let lower = match after {
            Some((key, primary)) => {
                let sibling = self.entries.get(key).and_then(|set| {
                    set.range::<Key, _>((Bound::Excluded(primary), Bound::Unbounded))
                        .next()
                });
                if let Some(next) = sibling {
                    return Some((key.clone(), next.clone()));
                }
                Bound::Excluded(key)
            }
            None => lower,
        };
        if !is_nonempty(lower, upper) {
            return None;
        }
        self.entries
            .range::<Key, _>((lower, upper))
            .next()
            .and_then(|(key, set)| set.iter().next().map(|p| (key.clone(), p.clone())))
    }

    fn step_backward(
        &self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        after: Option<(&Key, &Key)>,
    ) -> Option<(Key, Key)> {
        let upper = match after {
            Some((key, primary)) => {
                let sibling = self.entries.get(key).and_then(|set| {
                    set.range::<Key, _>((Bound::Unbounded, Bound::Excluded(primary)))
                        .next_back()
                });
                if let Some(prev) = sibling {
                    return Some((key.clone(), prev.clone()));
                }
                Bound::Excluded(key)
            }
            None => upper,
        };
        if !is_nonempty(lower, upper) {
            return None;
        }
        self.entries
            .range::<Key, _>((lower, upper))
            .next_back()
            .and_then(|(key, set)| set.iter().next_back().map(|p| (key.clone(), p.clone())))
    }
}
