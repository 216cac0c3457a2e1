//! # Brickstore Codec
//!
//! Record values and their binary encoding.
//!
//! This crate provides:
//! - [`Value`], the dynamic structured value every record is made of
//! - serde integration, so records can be read from JSON or any other
//!   self-describing format
//! - CBOR encoding used by the engine journal
//!
//! Integers and floats are distinct: JSON `2` decodes to an integer and
//! `2.0` to a float, and both survive a CBOR round trip as they were.
//!
//! ## Usage
//!
//! ```
//! use brickstore_codec::{to_cbor, from_cbor, Value};
//!
//! let record = Value::record([("k", Value::from("a")), ("v", Value::from(1))]);
//! let bytes = to_cbor(&record).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(buffer)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or contain values
/// that cannot be represented (integers beyond i64).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_record_roundtrip() {
        let value = Value::record([
            ("name", Value::from("Alice")),
            ("age", Value::from(30)),
            ("avatar", Value::Bytes(vec![0, 1, 2])),
            (
                "friends",
                Value::Array(vec![Value::record([("name", Value::from("Bob"))])]),
            ),
            ("nickname", Value::Null),
            ("active", Value::Bool(true)),
            ("balance", Value::Integer(i64::MIN)),
        ]);
        let bytes = to_cbor(&value).unwrap();
        let decoded = from_cbor(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn non_text_map_keys_survive() {
        let value = Value::map(vec![
            (Value::Integer(2), Value::from("two")),
            (Value::Integer(1), Value::from("one")),
        ]);
        let decoded = from_cbor(&to_cbor(&value).unwrap()).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn floats_decode() {
        // 0xfb = double-precision float 1.5
        let bytes = [0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0];
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Float(1.5));

        let value = Value::record([("price", Value::Float(9.99)), ("whole", Value::Float(3.0))]);
        assert_eq!(from_cbor(&to_cbor(&value).unwrap()).unwrap(), value);
    }
}
