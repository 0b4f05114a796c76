//! Canonical serialization for structural hashing.
//!
//! Representations keep their insertion order for output, but two
//! representations with the same key/value pairs must hash the same. This
//! module produces a canonical byte form for hashing:
//!
//! - Object keys are emitted in sorted order, recursively
//! - Arrays keep their index order
//! - Scalars serialize as `serde_json` writes them

use serde::Serialize;
use serde_json::{Map, Value};
use xxhash_rust::xxh64::xxh64;

/// Return a copy of `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize a JSON value to canonical bytes for hashing.
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    canonicalize(value).to_string().into_bytes()
}

/// Compute the canonical hash of a JSON value.
pub fn canonical_hash(value: &Value) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute the canonical hash and return it as a hex string.
pub fn canonical_hash_hex(value: &Value) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Canonical hex hash of any serializable value.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(canonical_hash_hex(&serde_json::to_value(value)?))
}
