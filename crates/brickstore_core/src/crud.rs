//! Single-record operations.
//!
//! Keyed stores address records through the unique index on their key
//! field and keep the surrogate identifier internal. Keyless stores address
//! records by that identifier directly. Writes settle once their
//! transaction commits.

use crate::error::{StoreError, StoreResult};
use crate::request::{wrap, Pending};
use crate::store::Store;
use brickstore_engine::{ErrorEvent, Key, RequestHandlers, TransactionMode, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

impl Store {
    /// Adds a new record.
    ///
    /// Resolves with the record's key: the key field's value for keyed
    /// stores, the generated identifier otherwise.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingKey`] if a keyed store's record has no valid
    /// key, [`StoreError::ConstraintViolation`] if the key is taken.
    pub fn insert(&self, record: Value) -> Pending<Key> {
        self.submit(move |inner, conn, deferred| {
            let key = match inner.strategy.record_key(&record) {
                Ok(key) => key,
                Err(error) => return deferred.reject(error),
            };
            let Some((store, outcome)) = inner.open_write(conn, deferred) else {
                return;
            };
            trace!(store = store.name(), ?key, "insert");
            store.add(record, None, outcome.handlers(move |id: Key| Ok(key.unwrap_or(id))));
        })
    }

    /// Adds several records in one transaction.
    ///
    /// Each record succeeds or fails on its own: a duplicate key rejects
    /// only its element and the other records are still committed. Results
    /// are in input order.
    pub fn insert_many(&self, records: Vec<Value>) -> Pending<Vec<StoreResult<Key>>> {
        self.submit(move |inner, conn, deferred| {
            let txn = match inner.transaction(conn, TransactionMode::ReadWrite) {
                Ok(txn) => txn,
                Err(error) => return deferred.reject(error),
            };
            let results: Arc<Mutex<Vec<Option<StoreResult<Key>>>>> =
                Arc::new(Mutex::new(vec![None; records.len()]));

            let settled = Arc::clone(&results);
            txn.on_complete(move |completion| match completion {
                Ok(()) => deferred.resolve(
                    settled
                        .lock()
                        .drain(..)
                        .map(|result| result.unwrap_or(Err(StoreError::Interrupted)))
                        .collect(),
                ),
                Err(error) => deferred.reject(StoreError::UnderlyingFault(error)),
            });

            let store = txn.object_store();
            for (slot, record) in records.into_iter().enumerate() {
                let key = match inner.strategy.record_key(&record) {
                    Ok(key) => key,
                    Err(error) => {
                        results.lock()[slot] = Some(Err(error));
                        continue;
                    }
                };
                let added = Arc::clone(&results);
                let failed = Arc::clone(&results);
                store.add(
                    record,
                    None,
                    RequestHandlers::new(
                        move |id: Key| added.lock()[slot] = Some(Ok(key.unwrap_or(id))),
                        move |event: &mut ErrorEvent| {
                            event.prevent_default();
                            failed.lock()[slot] = Some(Err(StoreError::from(event.error().clone())));
                        },
                    ),
                );
            }
        })
    }

    /// Stores `record` under `key`, replacing any record already there.
    ///
    /// For keyed stores the record's key field must hold `key`; the
    /// identifier of an existing record with that key is reused.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyMismatch`] if the record's key field holds another
    /// key, [`StoreError::MissingKey`] if it holds none.
    pub fn set(&self, key: impl Into<Key>, record: Value) -> Pending<Key> {
        let key = key.into();
        self.submit(move |inner, conn, deferred| {
            if let Err(error) = inner.strategy.check_key(&key, &record) {
                return deferred.reject(error);
            }
            let Some((store, outcome)) = inner.open_write(conn, deferred) else {
                return;
            };
            trace!(store = store.name(), %key, "set");
            let Some(field) = inner.strategy.key_field() else {
                return store.put(record, Some(key), outcome.handlers(Ok));
            };
            let index = match store.index(field) {
                Ok(index) => index,
                Err(error) => return outcome.record(Err(error.into())),
            };
            let put = outcome.clone();
            index.get_key(
                key.clone(),
                outcome.then(move |id: Option<Key>| {
                    store.put(record, id, put.handlers(move |_| Ok(key)));
                }),
            );
        })
    }

    /// Fetches the record stored under `key`, or `None`.
    pub fn get(&self, key: impl Into<Key>) -> Pending<Option<Value>> {
        let key = key.into();
        self.submit(move |inner, conn, deferred| {
            let Some((store, deferred)) = inner.open_read(conn, deferred) else {
                return;
            };
            match inner.strategy.key_field() {
                Some(field) => match store.index(field) {
                    Ok(index) => index.get(key, wrap(deferred, Ok)),
                    Err(error) => deferred.reject(error.into()),
                },
                None => store.get(key, wrap(deferred, Ok)),
            }
        })
    }

    /// Deletes the record stored under `key`. Missing keys are not an error.
    pub fn remove(&self, key: impl Into<Key>) -> Pending<()> {
        let key = key.into();
        self.submit(move |inner, conn, deferred| {
            let Some((store, outcome)) = inner.open_write(conn, deferred) else {
                return;
            };
            trace!(store = store.name(), %key, "remove");
            let Some(field) = inner.strategy.key_field() else {
                return store.delete(key, outcome.handlers(Ok));
            };
            let index = match store.index(field) {
                Ok(index) => index,
                Err(error) => return outcome.record(Err(error.into())),
            };
            let deleted = outcome.clone();
            index.get_key(
                key,
                outcome.then(move |id: Option<Key>| match id {
                    Some(id) => store.delete(id, deleted.handlers(Ok)),
                    None => deleted.record(Ok(())),
                }),
            );
        })
    }
}
