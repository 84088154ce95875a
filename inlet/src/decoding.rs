//! Streaming JSON content decoding for downloaded blob bodies.
//!
//! Telemetry blobs arrive in three top-level shapes: a single object, a
//! newline-delimited stream of objects, or an array of objects. The decoder
//! scans the body one top-level value at a time rather than slurping the whole
//! input, which bounds per-value memory and lets malformed input be reported
//! with an exact byte offset. Each record keeps its original raw bytes so
//! callers can re-emit payloads byte-identically.

use bytes::Bytes;
use serde_json::value::RawValue;
use serde_json::{Deserializer, Map, Value};
use thiserror::Error;

/// Errors produced while decoding a blob body.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The downloaded body contained no bytes.
    #[error("blob body is empty")]
    BodyEmpty,

    /// A top-level value or array element was not a JSON object.
    #[error("unsupported top-level JSON type: {found}")]
    UnsupportedType {
        /// Name of the JSON type that was found instead of an object.
        found: &'static str,
    },

    /// The input stopped being valid JSON at the given byte offset.
    #[error("malformed JSON at stream position {offset}: {source}")]
    Malformed {
        /// Byte offset into the body where decoding failed.
        offset: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One decoded record: the parsed key/value map plus its raw JSON bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedObject {
    /// Decoded fields with numbers normalized to concrete types.
    pub fields: Map<String, Value>,
    /// The record's original JSON text, unmodified.
    pub raw: Bytes,
}

/// Decodes a blob body into its object records.
///
/// An empty body yields [`DecodeError::BodyEmpty`]. Top-level objects become
/// one record each; a top-level array is streamed element by element, where
/// every element must itself be an object. Any other shape is rejected with
/// [`DecodeError::UnsupportedType`].
pub fn decode_objects(body: &[u8]) -> Result<Vec<DecodedObject>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::BodyEmpty);
    }

    let mut records = Vec::new();
    let mut stream = Deserializer::from_slice(body).into_iter::<&RawValue>();

    while let Some(item) = stream.next() {
        let offset = stream.byte_offset();
        let raw = item.map_err(|source| DecodeError::Malformed { offset, source })?;
        let value: Value = serde_json::from_str(raw.get())
            .map_err(|source| DecodeError::Malformed { offset, source })?;

        match value {
            Value::Object(fields) => records.push(make_record(fields, raw)),
            Value::Array(elements) => decode_array(elements, raw, offset, &mut records)?,
            other => {
                return Err(DecodeError::UnsupportedType {
                    found: json_type_name(&other),
                });
            }
        }
    }

    Ok(records)
}

/// Streams the elements of a top-level array into records.
///
/// Elements are paired with their raw text so each record still carries its
/// exact original bytes. A non-object element rejects the whole body.
fn decode_array(
    elements: Vec<Value>,
    raw: &RawValue,
    offset: usize,
    records: &mut Vec<DecodedObject>,
) -> Result<(), DecodeError> {
    // The array already parsed once, so this cannot fail on shape; any error
    // here is a genuine malformation of the element stream.
    let raw_elements: Vec<&RawValue> = serde_json::from_str(raw.get())
        .map_err(|source| DecodeError::Malformed { offset, source })?;

    for (element, raw_element) in elements.into_iter().zip(raw_elements) {
        match element {
            Value::Object(fields) => records.push(make_record(fields, raw_element)),
            other => {
                return Err(DecodeError::UnsupportedType {
                    found: json_type_name(&other),
                });
            }
        }
    }

    Ok(())
}

fn make_record(mut fields: Map<String, Value>, raw: &RawValue) -> DecodedObject {
    for value in fields.values_mut() {
        normalize_numbers(value);
    }

    DecodedObject {
        fields,
        raw: Bytes::copy_from_slice(raw.get().as_bytes()),
    }
}

/// Normalizes numbers to concrete types, recursively.
///
/// Integral values that fit `i64` stay signed integers; anything wider is
/// converted to `f64`, so downstream consumers see at most two numeric types.
fn normalize_numbers(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if number.as_i64().is_none() {
                if let Some(wide) = number.as_u64() {
                    *value = Value::from(wide as f64);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_numbers(item);
            }
        }
        Value::Object(fields) => {
            for item in fields.values_mut() {
                normalize_numbers(item);
            }
        }
        _ => {}
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
