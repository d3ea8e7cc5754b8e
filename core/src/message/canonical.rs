//! Canonical JSON: the byte form used for both hashing and transmission.
//!
//! Rules:
//! - object keys sorted by code point, recursively
//! - `,` and `:` separators, no whitespace
//! - DEL and non-ASCII characters escaped as `\uXXXX` (UTF-16 units, lowercase hex)
//!
//! The escaping matches what the reference peer emits, so a digest computed
//! here agrees with one computed on the other end of the connection.

use serde::Serialize;
use serde_json::{Map, Value};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value = serde_json::to_value(value)?;
    value_to_canonical_bytes(value)
}

/// Canonical bytes for an already-built JSON value.
pub fn value_to_canonical_bytes(value: Value) -> Result<Vec<u8>, CanonicalError> {
    let canon = canon_value(value);
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    canon.serialize(&mut ser)?;
    Ok(out)
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canon_value(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canon_value).collect()),
        other => other,
    }
}

/// Compact formatter that keeps the output pure ASCII.
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\x7f' {
                continue;
            }
            writer.write_all(&bytes[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&bytes[start..])
    }
}
