//! Host environment: where stores find their database.

use crate::error::{StoreError, StoreResult};
use brickstore_engine::{Config, Factory};
use std::path::Path;

/// The host capabilities a store opens against.
///
/// An environment without a factory stands for a host that offers no
/// database at all; stores opened there fail their readiness gate with
/// [`StoreError::StoreUnavailable`].
#[derive(Debug, Clone, Default)]
pub struct Environment {
    factory: Option<Factory>,
}

impl Environment {
    /// An environment backed by `factory`.
    #[must_use]
    pub fn new(factory: Factory) -> Self {
        Self {
            factory: Some(factory),
        }
    }

    /// An environment without a database.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// An environment whose databases live in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreUnavailable`] outside a tokio runtime.
    pub fn in_memory() -> StoreResult<Self> {
        Factory::in_memory()
            .map(Self::new)
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    /// An environment keeping database journals under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreUnavailable`] outside a tokio runtime or
    /// when the directory cannot be used.
    pub fn persistent(dir: impl AsRef<Path>, config: Config) -> StoreResult<Self> {
        Factory::open_dir(dir, config)
            .map(Self::new)
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    /// The database factory, if the host has one.
    #[must_use]
    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }
}
