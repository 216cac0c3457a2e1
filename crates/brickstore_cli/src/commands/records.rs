//! Single-record commands.

use super::json::{parse_key, parse_value, parse_values, render, render_key, render_result};
use super::CliError;
use brickstore_core::Store;
use serde_json::Value as Json;

/// Runs `insert`: prints the new record's key.
pub async fn insert(store: &Store, record: &str) -> Result<Json, CliError> {
    let key = store.insert(parse_value(record)?).await?;
    render_key(&key)
}

/// Runs `insert-many`: prints one `{"key"}` or `{"error"}` per record.
pub async fn insert_many(store: &Store, records: &str) -> Result<Json, CliError> {
    let results = store.insert_many(parse_values(records)?).await?;
    results
        .iter()
        .map(render_result)
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array)
}

/// Runs `set`: prints the key the record was stored under.
pub async fn set(store: &Store, key: &str, record: &str) -> Result<Json, CliError> {
    let key = store.set(parse_key(key)?, parse_value(record)?).await?;
    render_key(&key)
}

/// Runs `get`: prints the record, or `null`.
pub async fn get(store: &Store, key: &str) -> Result<Json, CliError> {
    match store.get(parse_key(key)?).await? {
        Some(record) => render(&record),
        None => Ok(Json::Null),
    }
}

/// Runs `remove`.
pub async fn remove(store: &Store, key: &str) -> Result<Json, CliError> {
    store.remove(parse_key(key)?).await?;
    Ok(Json::Bool(true))
}
