//! Object store and index handles.

use crate::cursor::{CursorDirection, CursorHandlers, CursorRequest, CursorSource, CursorStep};
use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use crate::request::RequestHandlers;
use crate::schema::IndexSchema;
use crate::transaction::{Transaction, TransactionMode, WorkArea};
use brickstore_codec::Value;

/// An object store as seen through one transaction.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    txn: Transaction,
}

impl ObjectStore {
    pub(crate) fn new(txn: Transaction) -> Self {
        Self { txn }
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.txn.store_name()
    }

    /// The transaction this handle belongs to.
    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    /// Writes `value`, replacing any record under the same key.
    ///
    /// Without `key` the store's key generator supplies one. The success
    /// callback receives the key the record was stored under.
    pub fn put(&self, value: Value, key: Option<Key>, handlers: RequestHandlers<Key>) {
        self.write(handlers, move |area| area.put(value, key, false));
    }

    /// Like [`Self::put`] but fails with a constraint error if the key is
    /// already taken.
    pub fn add(&self, value: Value, key: Option<Key>, handlers: RequestHandlers<Key>) {
        self.write(handlers, move |area| area.put(value, key, true));
    }

    /// Reads the record under `key`.
    pub fn get(&self, key: Key, handlers: RequestHandlers<Option<Value>>) {
        self.txn
            .request(handlers, move |area| Ok(area.store()?.get(&key).cloned()));
    }

    /// Removes every record in `range`.
    pub fn delete(&self, range: impl Into<KeyRange>, handlers: RequestHandlers<()>) {
        let range = range.into();
        self.write(handlers, move |area| area.delete(&range));
    }

    /// Counts records, optionally only those in `range`.
    pub fn count(&self, range: Option<KeyRange>, handlers: RequestHandlers<u64>) {
        self.txn
            .request(handlers, move |area| Ok(area.store()?.count(range.as_ref())));
    }

    /// Removes every record.
    pub fn clear(&self, handlers: RequestHandlers<()>) {
        self.write(handlers, |area| area.clear());
    }

    /// Walks records in primary key order.
    pub fn open_cursor(
        &self,
        range: Option<KeyRange>,
        direction: CursorDirection,
        handlers: CursorHandlers,
    ) {
        let request = CursorRequest::new(CursorSource::Records, range, direction, handlers);
        self.txn.enqueue(Box::new(CursorStep::open(request)));
    }

    /// Opens the named index.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the store has no such index.
    pub fn index(&self, name: &str) -> EngineResult<Index> {
        let schema = {
            let state = self.txn.database().state.lock();
            state
                .store(self.name())?
                .schema()
                .index(name)
                .cloned()
                .ok_or_else(|| {
                    EngineError::not_found(format!("index '{name}' in store '{}'", self.name()))
                })?
        };
        Ok(Index {
            store: self.clone(),
            schema,
        })
    }

    /// Names of the store's indexes.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let state = self.txn.database().state.lock();
        state
            .store(self.name())
            .map(|store| store.schema().index_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Queues a write, failing it on the spot in a read-only transaction.
    fn write<T, F>(&self, handlers: RequestHandlers<T>, work: F)
    where
        T: Send + 'static,
        F: FnOnce(&mut WorkArea<'_>) -> EngineResult<T> + Send + 'static,
    {
        if self.txn.mode() == TransactionMode::ReadOnly {
            // Rejected before queuing; the transaction is unaffected
            let _ = handlers.deliver(Err(EngineError::ReadOnly));
            return;
        }
        self.txn.request(handlers, work);
    }
}

/// A secondary index as seen through one transaction.
#[derive(Debug, Clone)]
pub struct Index {
    store: ObjectStore,
    schema: IndexSchema,
}

impl Index {
    /// Index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Dotted path of the indexed field.
    #[must_use]
    pub fn key_path(&self) -> &str {
        &self.schema.key_path
    }

    /// Whether the index is unique.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.schema.unique
    }

    /// The store the index belongs to.
    #[must_use]
    pub fn object_store(&self) -> &ObjectStore {
        &self.store
    }

    /// Reads the first record (by primary key) filed under `key`.
    pub fn get(&self, key: Key, handlers: RequestHandlers<Option<Value>>) {
        let name = self.schema.name.clone();
        self.store.txn.request(handlers, move |area| {
            let store = area.store()?;
            Ok(store
                .index(&name)?
                .first(&key)
                .and_then(|primary| store.get(primary))
                .cloned())
        });
    }

    /// Reads the first primary key filed under `key`.
    pub fn get_key(&self, key: Key, handlers: RequestHandlers<Option<Key>>) {
        let name = self.schema.name.clone();
        self.store.txn.request(handlers, move |area| {
            Ok(area.store()?.index(&name)?.first(&key).cloned())
        });
    }

    /// Counts entries, optionally only those whose index key is in `range`.
    pub fn count(&self, range: Option<KeyRange>, handlers: RequestHandlers<u64>) {
        let name = self.schema.name.clone();
        self.store.txn.request(handlers, move |area| {
            Ok(area.store()?.index(&name)?.count_in(range.as_ref()))
        });
    }

    /// Walks entries in `(index key, primary key)` order.
    pub fn open_cursor(
        &self,
        range: Option<KeyRange>,
        direction: CursorDirection,
        handlers: CursorHandlers,
    ) {
        let source = CursorSource::Index(self.schema.name.clone());
        let request = CursorRequest::new(source, range, direction, handlers);
        self.store.txn.enqueue(Box::new(CursorStep::open(request)));
    }
}
