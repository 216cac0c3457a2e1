//! Range queries with ordering and pagination.

use crate::error::{StoreError, StoreResult};
use crate::key_strategy::KeyStrategy;
use crate::request::{Deferred, Pending};
use crate::store::Store;
use brickstore_engine::{Cursor, CursorDirection, CursorHandlers, ErrorEvent, Key, KeyRange, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Options of [`Store::get_many`].
///
/// Records are ordered by the `orderby` index, else by the key field, else
/// by identifier. `start` and `end` are inclusive bounds in that order;
/// `offset` records are skipped and at most `count` are returned.
///
/// # Example
///
/// ```rust
/// use brickstore_core::RangeQuery;
///
/// // Third page of ten, newest first.
/// let query = RangeQuery::new().orderby("created").reverse(true).offset(20).count(10);
/// assert_eq!(query.count, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeQuery {
    /// Index to order by.
    pub orderby: Option<String>,
    /// Walk from the highest key down.
    pub reverse: bool,
    /// Inclusive lower bound.
    pub start: Option<Key>,
    /// Inclusive upper bound.
    pub end: Option<Key>,
    /// Maximum number of records returned.
    pub count: Option<usize>,
    /// Number of matching records skipped first.
    pub offset: Option<usize>,
}

impl RangeQuery {
    /// A query over every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders by the named index.
    #[must_use]
    pub fn orderby(mut self, index: impl Into<String>) -> Self {
        self.orderby = Some(index.into());
        self
    }

    /// Sets descending order.
    #[must_use]
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn start(mut self, key: impl Into<Key>) -> Self {
        self.start = Some(key.into());
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn end(mut self, key: impl Into<Key>) -> Self {
        self.end = Some(key.into());
        self
    }

    /// Limits the number of records returned.
    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Skips the first `offset` matching records.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The key range walked, or `None` for everything.
    pub(crate) fn key_range(&self) -> StoreResult<Option<KeyRange>> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => KeyRange::bound(start.clone(), end.clone(), false, false)
                .map(Some)
                .map_err(|_| StoreError::InvalidRange),
            (Some(start), None) => Ok(Some(KeyRange::lower_bound(start.clone(), false))),
            (None, Some(end)) => Ok(Some(KeyRange::upper_bound(end.clone(), false))),
            (None, None) => Ok(None),
        }
    }

    pub(crate) fn direction(&self) -> CursorDirection {
        if self.reverse {
            CursorDirection::Prev
        } else {
            CursorDirection::Next
        }
    }

    /// Index whose order the walk follows; `None` walks identifiers.
    pub(crate) fn key_space<'a>(&'a self, strategy: &'a KeyStrategy) -> Option<&'a str> {
        self.orderby.as_deref().or_else(|| strategy.key_field())
    }
}

/// Cursor walk state of one `get_many` call.
///
/// `position` counts every record the cursor visited, `collected` only the
/// ones kept; records are kept once `position` reaches the offset.
struct Walk {
    offset: usize,
    count: Option<usize>,
    position: usize,
    collected: usize,
    items: Vec<Value>,
}

impl Walk {
    fn new(query: &RangeQuery) -> Self {
        Self {
            offset: query.offset.unwrap_or(0),
            count: query.count,
            position: 0,
            collected: 0,
            items: Vec::new(),
        }
    }

    fn full(&self) -> bool {
        self.count.is_some_and(|count| self.collected >= count)
    }

    /// Takes the cursor's record if it lies past the offset. Returns whether
    /// the walk should go on.
    fn visit(&mut self, cursor: &mut Cursor) -> bool {
        if self.position >= self.offset {
            self.items.push(cursor.take_value());
            self.collected += 1;
        }
        self.position += 1;
        !self.full()
    }

    fn handlers(mut self, deferred: Deferred<Vec<Value>>) -> CursorHandlers {
        let slot = Arc::new(Mutex::new(Some(deferred)));
        let failed = Arc::clone(&slot);
        CursorHandlers::new(
            move |cursor: Option<Cursor>| {
                if let Some(mut cursor) = cursor {
                    if self.visit(&mut cursor) {
                        cursor.continue_();
                        return;
                    }
                }
                trace!(
                    visited = self.position,
                    collected = self.collected,
                    "range walk finished"
                );
                if let Some(deferred) = slot.lock().take() {
                    deferred.resolve(std::mem::take(&mut self.items));
                }
            },
            move |event: &mut ErrorEvent| {
                event.prevent_default();
                if let Some(deferred) = failed.lock().take() {
                    deferred.reject(StoreError::from(event.error().clone()));
                }
            },
        )
    }
}

impl Store {
    /// Fetches records in key order, with optional bounds and pagination.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownIndex`] if `orderby` names no index of the
    /// store, [`StoreError::InvalidRange`] if `start` lies after `end`.
    pub fn get_many(&self, query: RangeQuery) -> Pending<Vec<Value>> {
        self.submit(move |inner, conn, deferred| {
            let range = match query.key_range() {
                Ok(range) => range,
                Err(error) => return deferred.reject(error),
            };
            let Some((store, deferred)) = inner.open_read(conn, deferred) else {
                return;
            };
            let index = match query.key_space(&inner.strategy) {
                Some(name) => match store.index(name) {
                    Ok(index) => Some(index),
                    Err(_) => {
                        return deferred.reject(StoreError::UnknownIndex {
                            name: name.to_string(),
                        })
                    }
                },
                None => None,
            };
            if query.count == Some(0) {
                return deferred.resolve(Vec::new());
            }
            trace!(store = store.name(), ?query, "range walk");
            let handlers = Walk::new(&query).handlers(deferred);
            match index {
                Some(index) => index.open_cursor(range, query.direction(), handlers),
                None => store.open_cursor(range, query.direction(), handlers),
            }
        })
    }

    /// Fetches every record in key order.
    pub fn get_all(&self) -> Pending<Vec<Value>> {
        self.get_many(RangeQuery::default())
    }
}
