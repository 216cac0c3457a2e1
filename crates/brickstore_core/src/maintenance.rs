//! Whole-store operations.

use crate::request::{wrap, Pending};
use crate::store::Store;
use tracing::debug;

impl Store {
    /// Number of records in the store.
    pub fn size(&self) -> Pending<u64> {
        self.submit(|inner, conn, deferred| {
            let Some((store, deferred)) = inner.open_read(conn, deferred) else {
                return;
            };
            store.count(None, wrap(deferred, Ok));
        })
    }

    /// Deletes every record. The store stays open and keeps its indices.
    pub fn clear(&self) -> Pending<()> {
        self.submit(|inner, conn, deferred| {
            let Some((store, outcome)) = inner.open_write(conn, deferred) else {
                return;
            };
            debug!(store = store.name(), "clearing store");
            store.clear(outcome.handlers(Ok));
        })
    }
}
