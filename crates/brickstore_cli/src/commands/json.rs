//! JSON at the command-line boundary.

use super::CliError;
use brickstore_core::{Key, StoreResult, Value};

/// Parses a record.
pub fn parse_value(input: &str) -> Result<Value, CliError> {
    serde_json::from_str(input).map_err(|e| CliError::InvalidJson {
        input: input.to_string(),
        message: e.to_string(),
    })
}

/// Parses a JSON array of records.
pub fn parse_values(input: &str) -> Result<Vec<Value>, CliError> {
    match parse_value(input)? {
        Value::Array(items) => Ok(items),
        _ => Err(CliError::InvalidInput(format!(
            "expected a JSON array of records, got {input}"
        ))),
    }
}

/// Parses a key: an integer, string, or array of keys.
///
/// Input that is not valid JSON is taken as a bare string, so `get alice`
/// works without quoting.
pub fn parse_key(input: &str) -> Result<Key, CliError> {
    let value = serde_json::from_str::<Value>(input).unwrap_or_else(|_| Value::from(input));
    Key::try_from(value).map_err(|e| CliError::InvalidInput(e.to_string()))
}

/// Renders a value as JSON.
pub fn render(value: &Value) -> Result<serde_json::Value, CliError> {
    serde_json::to_value(value).map_err(|e| CliError::InvalidInput(e.to_string()))
}

/// Renders a key as JSON.
pub fn render_key(key: &Key) -> Result<serde_json::Value, CliError> {
    render(&key.to_value())
}

/// Renders a per-record result of a batch.
pub fn render_result(result: &StoreResult<Key>) -> Result<serde_json::Value, CliError> {
    Ok(match result {
        Ok(key) => serde_json::json!({ "key": render_key(key)? }),
        Err(error) => serde_json::json!({ "error": error.to_string() }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickstore_core::StoreError;
    use serde_json::json;

    #[test]
    fn keys() {
        assert_eq!(parse_key("7").unwrap(), Key::Integer(7));
        assert_eq!(parse_key("\"7\"").unwrap(), Key::from("7"));
        assert_eq!(parse_key("alice").unwrap(), Key::from("alice"));
        assert_eq!(
            parse_key("[1, \"a\"]").unwrap(),
            Key::Array(vec![Key::Integer(1), Key::from("a")])
        );
        assert_eq!(parse_key("2.5").unwrap(), Key::Float(2.5));
        assert!(parse_key("true").is_err());
        assert!(parse_key("null").is_err());
    }

    #[test]
    fn records() {
        let record = parse_value(r#"{"k": "a", "v": 1}"#).unwrap();
        assert_eq!(record.get("v"), Some(&Value::Integer(1)));
        assert_eq!(render(&record).unwrap(), json!({"k": "a", "v": 1}));
        assert!(parse_value("{").is_err());

        let priced = parse_value(r#"{"k": "a", "price": 9.99}"#).unwrap();
        assert_eq!(priced.get("price"), Some(&Value::Float(9.99)));
        assert_eq!(render(&priced).unwrap(), json!({"k": "a", "price": 9.99}));
    }

    #[test]
    fn batches() {
        assert_eq!(parse_values("[1, 2]").unwrap().len(), 2);
        assert!(parse_values("{}").is_err());
        assert_eq!(
            render_result(&Ok(Key::Integer(3))).unwrap(),
            json!({"key": 3})
        );
        assert_eq!(
            render_result(&Err(StoreError::InvalidRange)).unwrap(),
            json!({"error": "range start is greater than range end"})
        );
    }
}
