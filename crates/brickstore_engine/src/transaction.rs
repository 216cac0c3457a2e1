//! Transactions and the task that drives them.
//!
//! A transaction is a queue of operations run by one task on the runtime.
//! The task waits for the previous transaction on the same database to
//! finish, runs queued operations in order, and commits once the queue is
//! empty and no [`Transaction`] handle (including the ones captured inside
//! cursors and callbacks) is left to add more work.
//!
//! Writes are applied to the shared state immediately and recorded twice:
//! an undo log to roll back on abort and a redo log appended to the
//! journal on commit.

use crate::data::DatabaseState;
use crate::database::{Database, Turn};
use crate::error::{EngineError, EngineResult};
use crate::handle::ObjectStore;
use crate::journal::{JournalEntry, Mutation};
use crate::key::{Key, KeyRange};
use crate::request::{Operation, Request, RequestHandlers};
use brickstore_codec::Value;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

type CompletionFn = Box<dyn FnOnce(EngineResult<()>) + Send>;

pub(crate) struct TxnShared {
    id: u64,
    db: Arc<Database>,
    store: String,
    mode: TransactionMode,
    queue: Mutex<VecDeque<Box<dyn Operation>>>,
    handles: AtomicUsize,
    wake: Notify,
    finished: AtomicBool,
    outcome: Mutex<Option<EngineResult<()>>>,
    on_complete: Mutex<Vec<CompletionFn>>,
}

/// A handle to a running transaction.
///
/// Cloning adds a handle; the transaction commits after the last handle is
/// dropped and all queued requests have run.
pub struct Transaction {
    shared: Arc<TxnShared>,
}

impl Transaction {
    pub(crate) fn begin(
        db: Arc<Database>,
        store: String,
        mode: TransactionMode,
        runtime: &Handle,
    ) -> Self {
        let turn = db.next_turn();
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(txn = id, database = db.name(), store = %store, ?mode, "transaction created");

        let shared = Arc::new(TxnShared {
            id,
            db,
            store,
            mode,
            queue: Mutex::new(VecDeque::new()),
            handles: AtomicUsize::new(1),
            wake: Notify::new(),
            finished: AtomicBool::new(false),
            outcome: Mutex::new(None),
            on_complete: Mutex::new(Vec::new()),
        });
        runtime.spawn(drive(Arc::clone(&shared), turn));
        Self { shared }
    }

    fn from_shared(shared: Arc<TxnShared>) -> Self {
        shared.handles.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }

    /// Transaction id, unique within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.shared.mode
    }

    /// Name of the store this transaction covers.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.shared.store
    }

    /// Returns true once the transaction has committed or aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// The object store this transaction covers.
    #[must_use]
    pub fn object_store(&self) -> ObjectStore {
        ObjectStore::new(self.clone())
    }

    /// Registers a callback for the outcome: `Ok` on commit, the cause on
    /// abort. Runs immediately if the transaction already finished.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(EngineResult<()>) + Send + 'static,
    {
        let mut callbacks = self.shared.on_complete.lock();
        let finished = self.shared.outcome.lock().clone();
        match finished {
            Some(outcome) => {
                drop(callbacks);
                callback(outcome);
            }
            None => callbacks.push(Box::new(callback)),
        }
    }

    /// Rolls the transaction back once the requests queued so far have run.
    pub fn abort(&self) {
        self.request(RequestHandlers::<()>::ignore(), |_| {
            Err(EngineError::aborted("aborted by caller"))
        });
    }

    pub(crate) fn request<T, F>(&self, handlers: RequestHandlers<T>, work: F)
    where
        T: Send + 'static,
        F: FnOnce(&mut WorkArea<'_>) -> EngineResult<T> + Send + 'static,
    {
        self.enqueue(Box::new(Request::new(handlers, work)));
    }

    pub(crate) fn enqueue(&self, op: Box<dyn Operation>) {
        {
            let mut queue = self.shared.queue.lock();
            if !self.shared.finished.load(Ordering::Acquire) {
                queue.push_back(op);
                drop(queue);
                self.shared.wake.notify_one();
                return;
            }
        }
        op.cancel(EngineError::TransactionInactive);
    }

    pub(crate) fn database(&self) -> &Arc<Database> {
        &self.shared.db
    }
}

impl Clone for Transaction {
    fn clone(&self) -> Self {
        Self::from_shared(Arc::clone(&self.shared))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.wake.notify_one();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.shared.id)
            .field("store", &self.shared.store)
            .field("mode", &self.shared.mode)
            .finish()
    }
}

/// A rollback step.
pub(crate) enum Undo {
    /// Put `key` back to `previous` (remove it if `None`).
    Record { key: Key, previous: Option<Value> },
    /// Put back every record dropped by a clear.
    Clear(BTreeMap<Key, Value>),
    /// Put back the key generator.
    Generator(i64),
}

/// What an operation sees while it runs: the locked state plus the
/// transaction's logs.
pub(crate) struct WorkArea<'a> {
    state: &'a mut DatabaseState,
    shared: &'a Arc<TxnShared>,
    undo: &'a mut Vec<Undo>,
    redo: &'a mut Vec<Mutation>,
}

impl WorkArea<'_> {
    pub(crate) fn store(&self) -> EngineResult<&crate::data::StoreData> {
        self.state.store(&self.shared.store)
    }

    fn require_write(&self) -> EngineResult<()> {
        match self.shared.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(EngineError::ReadOnly),
        }
    }

    /// Writes a record. Returns its key.
    pub(crate) fn put(
        &mut self,
        value: Value,
        key: Option<Key>,
        no_overwrite: bool,
    ) -> EngineResult<Key> {
        self.require_write()?;
        let journaled = self.shared.db.is_journaled();
        let store = self.state.store_mut(&self.shared.store)?;
        let generator = store.generator();
        let logged = journaled.then(|| value.clone());

        let (key, previous) = store.put(value, key, no_overwrite)?;
        if store.generator() != generator {
            self.undo.push(Undo::Generator(generator));
        }
        self.undo.push(Undo::Record {
            key: key.clone(),
            previous,
        });
        if let Some(value) = logged {
            self.redo.push(Mutation::Put {
                key: key.clone(),
                value,
            });
        }
        Ok(key)
    }

    /// Removes every record in `range`.
    pub(crate) fn delete(&mut self, range: &KeyRange) -> EngineResult<()> {
        self.require_write()?;
        let journaled = self.shared.db.is_journaled();
        let store = self.state.store_mut(&self.shared.store)?;
        for (key, value) in store.delete_range(range) {
            if journaled {
                self.redo.push(Mutation::Delete { key: key.clone() });
            }
            self.undo.push(Undo::Record {
                key,
                previous: Some(value),
            });
        }
        Ok(())
    }

    /// Removes every record.
    pub(crate) fn clear(&mut self) -> EngineResult<()> {
        self.require_write()?;
        let store = self.state.store_mut(&self.shared.store)?;
        let removed = store.clear();
        self.undo.push(Undo::Clear(removed));
        if self.shared.db.is_journaled() {
            self.redo.push(Mutation::Clear);
        }
        Ok(())
    }

    /// A new handle on the running transaction.
    pub(crate) fn handle(&self) -> Transaction {
        Transaction::from_shared(Arc::clone(self.shared))
    }
}

async fn drive(shared: Arc<TxnShared>, mut turn: Turn) {
    turn.wait().await;
    trace!(txn = shared.id, "transaction started");

    let mut undo = Vec::new();
    let mut redo = Vec::new();

    let result = loop {
        let next = shared.queue.lock().pop_front();
        match next {
            Some(op) => {
                let delivery = {
                    let mut state = shared.db.state.lock();
                    let mut area = WorkArea {
                        state: &mut state,
                        shared: &shared,
                        undo: &mut undo,
                        redo: &mut redo,
                    };
                    op.run(&mut area)
                };
                if let Some(error) = delivery() {
                    break Err(error);
                }
            }
            None => {
                let notified = shared.wake.notified();
                let idle =
                    shared.handles.load(Ordering::Acquire) == 0 && shared.queue.lock().is_empty();
                if idle {
                    break Ok(());
                }
                notified.await;
            }
        }
    };

    let outcome = match result {
        Ok(()) => commit(&shared, undo, redo),
        Err(error) => {
            rollback(&shared, undo);
            Err(error)
        }
    };
    finish(&shared, outcome);
    drop(turn);
}

fn commit(shared: &TxnShared, undo: Vec<Undo>, redo: Vec<Mutation>) -> EngineResult<()> {
    if !redo.is_empty() {
        let generator = shared
            .db
            .state
            .lock()
            .store(&shared.store)
            .map(crate::data::StoreData::generator)
            .unwrap_or_default();
        let entry = JournalEntry::Commit {
            store: shared.store.clone(),
            generator,
            mutations: redo,
        };
        if let Err(error) = shared.db.append(&entry) {
            warn!(txn = shared.id, %error, "journal append failed, rolling back");
            rollback(shared, undo);
            return Err(error);
        }
    }
    debug!(txn = shared.id, "transaction committed");
    Ok(())
}

fn rollback(shared: &TxnShared, undo: Vec<Undo>) {
    let mut state = shared.db.state.lock();
    if let Ok(store) = state.store_mut(&shared.store) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Record { key, previous } => store.restore(key, previous),
                Undo::Clear(records) => store.restore_all(records),
                Undo::Generator(generator) => store.set_generator(generator),
            }
        }
    }
    debug!(txn = shared.id, "transaction rolled back");
}

/// Marks the transaction finished, fails whatever is still queued and
/// reports the outcome.
fn finish(shared: &TxnShared, outcome: EngineResult<()>) {
    let pending: Vec<Box<dyn Operation>> = {
        let mut queue = shared.queue.lock();
        shared.finished.store(true, Ordering::Release);
        queue.drain(..).collect()
    };

    let cancel_error = match &outcome {
        Ok(()) => EngineError::TransactionInactive,
        Err(EngineError::Aborted { reason }) => EngineError::aborted(reason.clone()),
        Err(error) => EngineError::aborted(error.to_string()),
    };
    for op in pending {
        op.cancel(cancel_error.clone());
    }

    let callbacks = {
        let mut callbacks = shared.on_complete.lock();
        *shared.outcome.lock() = Some(outcome.clone());
        std::mem::take(&mut *callbacks)
    };
    for callback in callbacks {
        callback(outcome.clone());
    }
}
