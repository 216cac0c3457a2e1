//! Cursors over object stores and indexes.
//!
//! A cursor request reports each position to the same success callback:
//! `Some(cursor)` while records remain, then `None` once. The callback
//! moves the walk on with [`Cursor::continue_`] or [`Cursor::advance`];
//! dropping the cursor instead ends the walk.

use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use crate::request::{Delivery, ErrorEvent, Operation};
use crate::transaction::{Transaction, WorkArea};
use brickstore_codec::Value;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Order in which a cursor visits records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorDirection {
    /// Ascending key order.
    #[default]
    Next,
    /// Descending key order.
    Prev,
}

type StepFn = Box<dyn FnMut(Option<Cursor>) + Send>;
type CursorErrorFn = Box<dyn FnOnce(&mut ErrorEvent) + Send>;

/// Callbacks of a cursor request.
pub struct CursorHandlers {
    on_success: StepFn,
    on_error: Option<CursorErrorFn>,
}

impl CursorHandlers {
    /// Creates handlers from a step callback and an error callback.
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnMut(Option<Cursor>) + Send + 'static,
        E: FnOnce(&mut ErrorEvent) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_error: Some(Box::new(on_error)),
        }
    }
}

/// Which records a cursor walks.
#[derive(Debug, Clone)]
pub(crate) enum CursorSource {
    /// The store's records by primary key.
    Records,
    /// Entries of the named index.
    Index(String),
}

/// State shared by every step of one cursor request.
pub(crate) struct CursorRequest {
    source: CursorSource,
    range: Option<KeyRange>,
    direction: CursorDirection,
    handlers: Mutex<CursorHandlers>,
}

impl CursorRequest {
    pub(crate) fn new(
        source: CursorSource,
        range: Option<KeyRange>,
        direction: CursorDirection,
        handlers: CursorHandlers,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            range,
            direction,
            handlers: Mutex::new(handlers),
        })
    }

    /// Finds the position `skip + 1` steps past `after`.
    fn locate(
        &self,
        area: &WorkArea<'_>,
        after: Option<(Key, Key)>,
        skip: u32,
    ) -> EngineResult<Option<(Key, Key, Value)>> {
        let store = area.store()?;
        let range = self.range.as_ref();
        let mut position = after;

        for _ in 0..=skip {
            let next = match &self.source {
                CursorSource::Records => store
                    .step(range, position.as_ref().map(|(key, _)| key), self.direction)
                    .map(|key| (key.clone(), key)),
                CursorSource::Index(name) => store.index(name)?.step(
                    range,
                    position.as_ref().map(|(key, primary)| (key, primary)),
                    self.direction,
                ),
            };
            match next {
                Some(found) => position = Some(found),
                None => return Ok(None),
            }
        }

        Ok(position.and_then(|(key, primary)| {
            store
                .get(&primary)
                .cloned()
                .map(|value| (key, primary, value))
        }))
    }

    fn report(&self, cursor: Option<Cursor>) {
        let mut handlers = self.handlers.lock();
        (handlers.on_success)(cursor);
    }

    fn fail(&self, error: EngineError) -> Option<EngineError> {
        let on_error = self.handlers.lock().on_error.take();
        let mut event = ErrorEvent::new(error);
        if let Some(on_error) = on_error {
            on_error(&mut event);
        }
        if event.default_prevented() {
            None
        } else {
            Some(event.error().clone())
        }
    }
}

/// One queued cursor movement.
pub(crate) struct CursorStep {
    request: Arc<CursorRequest>,
    after: Option<(Key, Key)>,
    skip: u32,
}

impl CursorStep {
    /// The first movement of a new cursor.
    pub(crate) fn open(request: Arc<CursorRequest>) -> Self {
        Self {
            request,
            after: None,
            skip: 0,
        }
    }
}

impl Operation for CursorStep {
    fn run(self: Box<Self>, area: &mut WorkArea<'_>) -> Delivery {
        let CursorStep {
            request,
            after,
            skip,
        } = *self;

        match request.locate(area, after, skip) {
            Ok(Some((key, primary_key, value))) => {
                trace!(%key, %primary_key, "cursor step");
                let cursor = Cursor {
                    txn: area.handle(),
                    request: Arc::clone(&request),
                    key,
                    primary_key,
                    value,
                };
                Box::new(move || {
                    request.report(Some(cursor));
                    None
                })
            }
            Ok(None) => Box::new(move || {
                request.report(None);
                None
            }),
            Err(error) => Box::new(move || request.fail(error)),
        }
    }

    fn cancel(self: Box<Self>, error: EngineError) {
        let _ = self.request.fail(error);
    }
}

/// A position reached by a cursor request.
pub struct Cursor {
    txn: Transaction,
    request: Arc<CursorRequest>,
    key: Key,
    primary_key: Key,
    value: Value,
}

impl Cursor {
    /// The key at this position: the index key for index cursors, the
    /// primary key otherwise.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The primary key of the record at this position.
    #[must_use]
    pub fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    /// The record at this position.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Moves the record out, leaving `Null` behind.
    pub fn take_value(&mut self) -> Value {
        std::mem::replace(&mut self.value, Value::Null)
    }

    /// The transaction the cursor belongs to.
    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    /// Moves to the next position; the success callback fires again.
    pub fn continue_(self) {
        self.advance(1);
    }

    /// Moves `count` positions on. A count of zero moves one position.
    pub fn advance(self, count: u32) {
        let Cursor {
            txn,
            request,
            key,
            primary_key,
            ..
        } = self;
        txn.enqueue(Box::new(CursorStep {
            request,
            after: Some((key, primary_key)),
            skip: count.saturating_sub(1),
        }));
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("key", &self.key)
            .field("primary_key", &self.primary_key)
            .field("direction", &self.request.direction)
            .finish_non_exhaustive()
    }
}
