//! Connections and version changes.

use crate::data::{DatabaseState, StoreData};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::request::RequestHandlers;
use crate::schema::{IndexSchema, StoreSchema};
use crate::transaction::{Transaction, TransactionMode};
use std::sync::Arc;
use tokio::runtime::Handle;

/// An open connection to a database.
#[derive(Clone)]
pub struct Connection {
    db: Arc<Database>,
    runtime: Handle,
}

impl Connection {
    pub(crate) fn new(db: Arc<Database>, runtime: Handle) -> Self {
        Self { db, runtime }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.db.name()
    }

    /// Current schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.db.version()
    }

    /// Names of every object store, sorted.
    #[must_use]
    pub fn object_store_names(&self) -> Vec<String> {
        self.db.state.lock().store_names()
    }

    /// Definition of the named store, if it exists.
    #[must_use]
    pub fn store_schema(&self, name: &str) -> Option<StoreSchema> {
        self.db
            .state
            .lock()
            .store(name)
            .ok()
            .map(|store| store.schema().clone())
    }

    /// Starts a transaction over one object store.
    ///
    /// The transaction runs after every transaction started before it on
    /// the same database has finished.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown store, or
    /// [`EngineError::InvalidState`] if the database has been deleted.
    pub fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Transaction> {
        if self.db.is_closed() {
            return Err(EngineError::invalid_state(format!(
                "database '{}' has been deleted",
                self.db.name()
            )));
        }
        self.db.state.lock().store(store)?;
        Ok(Transaction::begin(
            Arc::clone(&self.db),
            store.to_string(),
            mode,
            &self.runtime,
        ))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.db.name())
            .field("version", &self.version())
            .finish()
    }
}

/// Schema editor handed to the upgrade callback of
/// [`crate::Factory::open`].
///
/// Changes apply to a copy of the database; they take effect only if the
/// callback returns `Ok`.
pub struct VersionChange<'a> {
    state: &'a mut DatabaseState,
    old_version: u32,
    new_version: u32,
}

impl<'a> VersionChange<'a> {
    pub(crate) fn new(state: &'a mut DatabaseState, old_version: u32, new_version: u32) -> Self {
        Self {
            state,
            old_version,
            new_version,
        }
    }

    /// Version before the change; 0 for a new database.
    #[must_use]
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Version being opened.
    #[must_use]
    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Names of every object store, sorted.
    #[must_use]
    pub fn object_store_names(&self) -> Vec<String> {
        self.state.store_names()
    }

    /// Definition of the named store, if it exists.
    #[must_use]
    pub fn store_schema(&self, name: &str) -> Option<StoreSchema> {
        self.state.store(name).ok().map(|store| store.schema().clone())
    }

    /// Creates an empty object store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Constraint`] if the name is taken.
    pub fn create_object_store(&mut self, name: &str, auto_increment: bool) -> EngineResult<()> {
        if self.state.stores.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "object store '{name}' already exists"
            )));
        }
        self.state.stores.insert(
            name.to_string(),
            StoreData::new(StoreSchema::new(name, auto_increment)),
        );
        Ok(())
    }

    /// Deletes an object store and its records.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown store.
    pub fn delete_object_store(&mut self, name: &str) -> EngineResult<()> {
        self.state
            .stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("object store '{name}'")))
    }

    /// Creates an index on `key_path` and fills it from existing records.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown store, or
    /// [`EngineError::Constraint`] if the name is taken or existing
    /// records break uniqueness.
    pub fn create_index(
        &mut self,
        store: &str,
        name: &str,
        key_path: &str,
        unique: bool,
    ) -> EngineResult<()> {
        self.state
            .store_mut(store)?
            .create_index(IndexSchema::new(name, key_path, unique))
    }

    /// Deletes an index.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown store or index.
    pub fn delete_index(&mut self, store: &str, name: &str) -> EngineResult<()> {
        self.state.store_mut(store)?.delete_index(name)
    }
}

type UpgradeFn = Box<dyn FnOnce(&mut VersionChange<'_>) -> EngineResult<()> + Send>;

/// Callbacks of an open request.
pub struct OpenHandlers {
    pub(crate) upgrade: Option<UpgradeFn>,
    pub(crate) request: RequestHandlers<Connection>,
}

impl OpenHandlers {
    /// Creates handlers reporting the connection or the failure.
    #[must_use]
    pub fn new(request: RequestHandlers<Connection>) -> Self {
        Self {
            upgrade: None,
            request,
        }
    }

    /// Sets the callback run when the requested version is newer than the
    /// recorded one. Returning an error fails the open and discards every
    /// schema change.
    #[must_use]
    pub fn on_upgrade_needed<F>(mut self, upgrade: F) -> Self
    where
        F: FnOnce(&mut VersionChange<'_>) -> EngineResult<()> + Send + 'static,
    {
        self.upgrade = Some(Box::new(upgrade));
        self
    }
}
