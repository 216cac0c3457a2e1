//! `size` and `clear`.

use super::CliError;
use brickstore_core::Store;
use serde_json::Value as Json;

/// Runs `size`: prints the record count.
pub async fn size(store: &Store) -> Result<Json, CliError> {
    Ok(Json::from(store.size().await?))
}

/// Runs `clear`: prints how many records were removed.
pub async fn clear(store: &Store) -> Result<Json, CliError> {
    let removed = store.size().await?;
    store.clear().await?;
    Ok(serde_json::json!({ "removed": removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickstore_core::{Environment, StoreConfig, Value};
    use serde_json::json;

    #[tokio::test]
    async fn size_and_clear() {
        let env = Environment::in_memory().unwrap();
        let store = Store::open(&env, StoreConfig::default());
        store
            .insert_many(vec![Value::from(1), Value::from(2)])
            .await
            .unwrap();
        assert_eq!(size(&store).await.unwrap(), json!(2));
        assert_eq!(clear(&store).await.unwrap(), json!({"removed": 2}));
        assert_eq!(size(&store).await.unwrap(), json!(0));
    }
}
