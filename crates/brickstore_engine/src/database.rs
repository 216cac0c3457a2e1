//! Shared per-database state.

use crate::data::DatabaseState;
use crate::error::{EngineError, EngineResult};
use crate::journal::{Journal, JournalEntry};
use brickstore_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

/// One open database, shared by every connection to it.
pub(crate) struct Database {
    name: String,
    pub(crate) state: Mutex<DatabaseState>,
    journal: Mutex<Option<Journal>>,
    journaled: bool,
    /// Completion signal of the most recently scheduled transaction.
    tail: Mutex<Option<oneshot::Receiver<()>>>,
    closed: AtomicBool,
}

impl Database {
    /// A database that lives only in memory.
    pub(crate) fn in_memory(name: &str) -> Self {
        Self::new(name, DatabaseState::default(), None)
    }

    /// Loads a database by replaying its journal.
    pub(crate) fn load(
        name: &str,
        backend: Box<dyn StorageBackend>,
        sync_on_commit: bool,
    ) -> EngineResult<Self> {
        let (journal, state) = Journal::open(backend, sync_on_commit)?;
        Ok(Self::new(name, state, Some(journal)))
    }

    fn new(name: &str, state: DatabaseState, journal: Option<Journal>) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(state),
            journaled: journal.is_some(),
            journal: Mutex::new(journal),
            tail: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn version(&self) -> u32 {
        self.state.lock().version
    }

    /// Whether commits are written to a journal.
    pub(crate) fn is_journaled(&self) -> bool {
        self.journaled
    }

    /// Appends an entry. A no-op for in-memory databases.
    pub(crate) fn append(&self, entry: &JournalEntry) -> EngineResult<()> {
        match self.journal.lock().as_mut() {
            Some(journal) => journal.append(entry),
            None if self.journaled => Err(EngineError::invalid_state(format!(
                "database '{}' has been closed",
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Reserves the next slot in the database's transaction order.
    ///
    /// Transactions (and version changes) run one at a time in the order
    /// their turns were taken.
    pub(crate) fn next_turn(&self) -> Turn {
        let (done, next) = oneshot::channel();
        let previous = self.tail.lock().replace(next);
        Turn {
            previous,
            _done: done,
        }
    }

    /// Stops new transactions and releases the journal.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.journal.lock().take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A place in a database's transaction order.
///
/// Dropping the turn lets the next one start.
pub(crate) struct Turn {
    previous: Option<oneshot::Receiver<()>>,
    _done: oneshot::Sender<()>,
}

impl Turn {
    /// Waits until every earlier turn has been dropped.
    pub(crate) async fn wait(&mut self) {
        if let Some(previous) = self.previous.take() {
            // A dropped sender also means the previous turn is over
            let _ = previous.await;
        }
    }
}
