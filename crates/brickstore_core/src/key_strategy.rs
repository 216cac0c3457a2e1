//! How records of a store are identified.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use brickstore_engine::{Key, Value};

/// Key strategy of a store, fixed when the store is opened.
///
/// Every record lives under a surrogate identifier generated by the engine.
/// Keyed stores additionally address records by a user-visible key field
/// backed by a unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Records are addressed by the value of this field.
    PrimaryKeyField(String),
    /// Records are addressed by their surrogate identifier.
    SurrogateIdentifier,
}

impl KeyStrategy {
    /// Derives the strategy from a store configuration.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        match &config.key {
            Some(field) => Self::PrimaryKeyField(field.clone()),
            None => Self::SurrogateIdentifier,
        }
    }

    /// The key field, for keyed stores.
    #[must_use]
    pub fn key_field(&self) -> Option<&str> {
        match self {
            Self::PrimaryKeyField(field) => Some(field.as_str()),
            Self::SurrogateIdentifier => None,
        }
    }

    /// Whether records are addressed by a key field.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::PrimaryKeyField(_))
    }

    /// The user-visible key of `record`.
    ///
    /// `None` for keyless stores.
    pub(crate) fn record_key(&self, record: &Value) -> StoreResult<Option<Key>> {
        let Self::PrimaryKeyField(field) = self else {
            return Ok(None);
        };
        record
            .get_path(field)
            .and_then(Key::from_value)
            .map(Some)
            .ok_or_else(|| StoreError::MissingKey {
                field: field.clone(),
            })
    }

    /// Checks that `record` may be stored under `key` by `set`.
    pub(crate) fn check_key(&self, key: &Key, record: &Value) -> StoreResult<()> {
        match self.record_key(record)? {
            Some(found) if &found != key => Err(StoreError::KeyMismatch {
                expected: key.clone(),
                found,
            }),
            _ => Ok(()),
        }
    }
}
