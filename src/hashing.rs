//! Digests for `build-manifest.json`
//!
//! A manifest is hashed over its canonical form: object keys sorted at every
//! depth, no insignificant whitespace. Two manifests that differ only in key
//! order hash the same.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Digest and byte length of a file.
pub fn file_digest(path: &Path) -> io::Result<(String, u64)> {
    let data = fs::read(path)?;
    Ok((sha256_hex(&data), data.len() as u64))
}

/// Compact JSON with keys ordered at every level.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonicalize(serde_json::to_value(value)?))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            let mut ordered = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                ordered.insert(key, canonicalize(inner));
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// `sha256_hex` of [`canonical_json`].
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(manifest)?.as_bytes()))
}
