//! Test fixtures and store helpers.
//!
//! Fixtures must be created inside a tokio runtime, e.g. from a
//! `#[tokio::test]`.

use crate::generators::{random_records, KEY_FIELD, SEQUENCE_FIELD, VALUE_FIELD};
use brickstore_core::{EngineConfig, Environment, Store, StoreConfig};
use std::path::Path;
use tempfile::TempDir;

/// Configuration of the `{k, v, i}` store used across scenarios.
pub fn people_config() -> StoreConfig {
    StoreConfig::new("people")
        .key(KEY_FIELD)
        .indices([VALUE_FIELD, SEQUENCE_FIELD])
}

/// An open store with automatic cleanup.
pub struct TestStore {
    /// The store.
    pub store: Store,
    /// The environment it was opened in.
    pub env: Environment,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Opens a store in a fresh in-memory environment and waits until it
    /// is ready.
    pub async fn memory(config: StoreConfig) -> Self {
        let env = Environment::in_memory().expect("Failed to create in-memory environment");
        Self::open(env, config, None).await
    }

    /// Opens a store journaled in a fresh temporary directory.
    pub async fn file(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let env = Environment::persistent(temp_dir.path(), EngineConfig::default())
            .expect("Failed to create persistent environment");
        Self::open(env, config, Some(temp_dir)).await
    }

    async fn open(env: Environment, config: StoreConfig, temp_dir: Option<TempDir>) -> Self {
        let store = Store::open(&env, config);
        store.ready().await.expect("Failed to open store");
        Self {
            store,
            env,
            _temp_dir: temp_dir,
        }
    }

    /// The journal directory, if file-based.
    pub fn dir(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the store, returning its journal directory.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    pub fn close(self) -> TempDir {
        let Self {
            store,
            env,
            _temp_dir,
        } = self;
        drop(store);
        drop(env);
        _temp_dir.expect("Only file stores can be closed")
    }

    /// Opens a store from the journals in `temp_dir` without waiting for it
    /// to become ready, so a failing open can be observed.
    pub fn open_in(temp_dir: TempDir, config: StoreConfig) -> Self {
        let env = Environment::persistent(temp_dir.path(), EngineConfig::default())
            .expect("Failed to reopen persistent environment");
        Self {
            store: Store::open(&env, config),
            env,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Closes the store and opens it again from its journal with `config`,
    /// without waiting for it to become ready.
    pub fn reopen_with(self, config: StoreConfig) -> Self {
        Self::open_in(self.close(), config)
    }

    /// Closes the store and opens it again from its journal.
    pub async fn reopen(self) -> Self {
        let config = self.store.config().clone();
        let reopened = self.reopen_with(config);
        reopened.ready().await.expect("Failed to reopen store");
        reopened
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// An in-memory `{k, v, i}` store holding `count` seeded records.
    pub async fn populated_store(count: usize, seed: u64) -> TestStore {
        let test_store = TestStore::memory(people_config()).await;
        let results = test_store
            .insert_many(random_records(count, seed))
            .await
            .expect("Failed to insert records");
        assert!(results.iter().all(Result::is_ok), "generated keys collided");
        test_store
    }
}
