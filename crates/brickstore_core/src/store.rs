//! Store handle: opening, readiness and operation submission.

use crate::config::{StoreConfig, StoreLayout, API_VERSION};
use crate::environment::Environment;
use crate::error::{StoreError, StoreResult};
use crate::gate::{Gate, Readiness};
use crate::key_strategy::KeyStrategy;
use crate::request::{deferred, Deferred, Outcome, Pending};
use brickstore_engine::{
    Connection, EngineResult, ErrorEvent, ObjectStore, OpenHandlers, RequestHandlers,
    StoreSchema, Transaction, TransactionMode, VersionChange,
};
use std::sync::Arc;
use tracing::debug;

pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) strategy: KeyStrategy,
    gate: Gate,
}

/// A key-value store backed by one object store of the engine.
///
/// Opening is asynchronous: operations may be called right away and are
/// held until the database is open, then started in the order they were
/// called. Every operation returns a [`Pending`] result that settles once.
/// Cloning a store yields another handle to the same store.
///
/// # Example
///
/// ```rust,ignore
/// let env = Environment::in_memory()?;
/// let store = Store::open(&env, StoreConfig::new("people").key("email").index("age"));
/// store.insert(Value::record([("email", "a@b.c"), ("age", 30)])).await?;
/// let adults = store.get_many(RangeQuery::new().orderby("age").start(18)).await?;
/// ```
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Opens the store described by `config` in `env`.
    ///
    /// On first open the object store is created with generated identifiers,
    /// a non-unique index per indexed field and a unique index on the key
    /// field. A later open must use the same key and indices, otherwise the
    /// store fails with [`StoreError::SchemaMismatch`].
    #[must_use]
    pub fn open(env: &Environment, config: StoreConfig) -> Self {
        let strategy = KeyStrategy::from_config(&config);
        let inner = Arc::new(StoreInner {
            config,
            strategy,
            gate: Gate::new(),
        });

        match env.factory() {
            Some(factory) => {
                debug!(store = %inner.config.name, "opening store");
                let upgrade_config = inner.config.clone();
                let opened = Arc::clone(&inner);
                let failed = Arc::clone(&inner);
                let handlers = OpenHandlers::new(RequestHandlers::new(
                    move |conn: Connection| {
                        let checked = check_layout(&conn, &opened.config).map(|()| conn);
                        opened.gate.settle(checked);
                    },
                    move |event: &mut ErrorEvent| {
                        failed
                            .gate
                            .settle(Err(StoreError::UnderlyingFault(event.error().clone())));
                    },
                ))
                .on_upgrade_needed(move |change| create_layout(change, &upgrade_config));
                factory.open(&inner.config.name, API_VERSION, handlers);
            }
            None => inner.gate.settle(Err(StoreError::unavailable(
                "no database factory in this environment",
            ))),
        }

        Self { inner }
    }

    /// The store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// How records are addressed.
    #[must_use]
    pub fn key_strategy(&self) -> &KeyStrategy {
        &self.inner.strategy
    }

    /// Current state of the readiness gate.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.inner.gate.readiness()
    }

    /// Resolves once the store is open, or with the reason it failed.
    pub fn ready(&self) -> Pending<()> {
        let (deferred, pending) = deferred();
        self.inner
            .gate
            .submit(Box::new(move |outcome: Result<&Connection, &StoreError>| {
                deferred.settle(outcome.map(|_| ()).map_err(Clone::clone));
            }));
        pending
    }

    /// Submits an operation through the readiness gate.
    ///
    /// `start` runs with the open connection; if the store failed to open
    /// the operation is rejected with [`StoreError::StoreUnavailable`].
    pub(crate) fn submit<T, F>(&self, start: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreInner, &Connection, Deferred<T>) + Send + 'static,
    {
        let (deferred, pending) = deferred();
        let inner = Arc::clone(&self.inner);
        self.inner
            .gate
            .submit(Box::new(move |outcome: Result<&Connection, &StoreError>| {
                match outcome {
                    Ok(conn) => start(&inner, conn, deferred),
                    Err(cause) => deferred.reject(cause.as_unavailable()),
                }
            }));
        pending
    }
}

impl StoreInner {
    /// Starts a transaction on this store's object store.
    pub(crate) fn transaction(
        &self,
        conn: &Connection,
        mode: TransactionMode,
    ) -> StoreResult<Transaction> {
        conn.transaction(&self.config.name, mode)
            .map_err(StoreError::from)
    }

    /// Starts a read-only transaction, or rejects `deferred`.
    pub(crate) fn open_read<T>(
        &self,
        conn: &Connection,
        deferred: Deferred<T>,
    ) -> Option<(ObjectStore, Deferred<T>)> {
        match self.transaction(conn, TransactionMode::ReadOnly) {
            Ok(txn) => Some((txn.object_store(), deferred)),
            Err(error) => {
                deferred.reject(error);
                None
            }
        }
    }

    /// Starts a read-write transaction whose commit settles `deferred`,
    /// or rejects it.
    pub(crate) fn open_write<T: Send + 'static>(
        &self,
        conn: &Connection,
        deferred: Deferred<T>,
    ) -> Option<(ObjectStore, Outcome<T>)> {
        match self.transaction(conn, TransactionMode::ReadWrite) {
            Ok(txn) => {
                let outcome = Outcome::on_commit(&txn, deferred);
                Some((txn.object_store(), outcome))
            }
            Err(error) => {
                deferred.reject(error);
                None
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.inner.config)
            .field("readiness", &self.readiness())
            .finish()
    }
}

/// Creates the object store and its indices on first open.
fn create_layout(change: &mut VersionChange<'_>, config: &StoreConfig) -> EngineResult<()> {
    let store = config.name.as_str();
    change.create_object_store(store, true)?;
    for field in config.secondary_indices() {
        change.create_index(store, field, field, false)?;
    }
    if let Some(key) = &config.key {
        change.create_index(store, key, key, true)?;
    }
    debug!(store, from = change.old_version(), "store layout created");
    Ok(())
}

/// Layout recorded in the database for a store schema.
fn recorded_layout(schema: &StoreSchema) -> StoreLayout {
    let mut layout = StoreLayout::default();
    for index in schema.indexes.values() {
        if index.unique {
            if layout.key.is_none() && index.name == index.key_path {
                layout.key = Some(index.name.clone());
            }
        } else {
            layout.indices.push(index.name.clone());
        }
    }
    layout
}

fn check_layout(conn: &Connection, config: &StoreConfig) -> StoreResult<()> {
    let schema = conn.store_schema(&config.name).ok_or_else(|| {
        StoreError::unavailable(format!(
            "database '{}' has no object store '{}'",
            conn.name(),
            config.name
        ))
    })?;
    let expected = config.layout();
    let recorded = recorded_layout(&schema);
    if expected != recorded {
        return Err(StoreError::SchemaMismatch {
            store: config.name.clone(),
            expected,
            recorded,
        });
    }
    Ok(())
}
