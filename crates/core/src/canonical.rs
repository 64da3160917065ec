//! Canonical JSON and BLAKE3 digests for persisted artifacts
//!
//! Object keys are sorted recursively and no whitespace is emitted, so a given
//! artifact always serialises to the same bytes and the same digest.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a value to canonical JSON
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json_value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&canonicalize(json_value))?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// BLAKE3 hex digest of raw bytes
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// BLAKE3 hex digest of a value's canonical JSON
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    Ok(digest_hex(to_canonical_json(value)?.as_bytes()))
}

/// Sidecar digest path: `best_model.json` -> `best_model.hash`
pub fn digest_path(path: &Path) -> PathBuf {
    path.with_extension("hash")
}

/// Write `value` as canonical JSON plus its digest sidecar; returns the digest
pub fn write_with_digest<T: Serialize>(path: &Path, value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    let digest = digest_hex(json.as_bytes());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &json)?;
    fs::write(digest_path(path), &digest)?;
    Ok(digest)
}

/// Digest recorded next to `path`, if any
pub fn read_digest(path: &Path) -> Result<Option<String>, CanonicalError> {
    let sidecar = digest_path(path);
    if !sidecar.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(sidecar)?.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        b_field: i64,
        a_field: i64,
        z_field: String,
    }

    fn sample(b: i64) -> Sample {
        Sample {
            b_field: b,
            a_field: 1,
            z_field: "test".to_string(),
        }
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = to_canonical_json(&sample(2)).unwrap();
        assert_eq!(json, r#"{"a_field":1,"b_field":2,"z_field":"test"}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let value = serde_json::json!({"outer_b": {"z": 2, "a": 1}, "outer_a": [{"y": 1, "b": 2}]});
        let json = to_canonical_json(&value).unwrap();
        assert_eq!(json, r#"{"outer_a":[{"b":2,"y":1}],"outer_b":{"a":1,"z":2}}"#);
    }

    #[test]
    fn test_hash_tracks_content() {
        let h1 = hash_canonical_hex(&sample(2)).unwrap();
        let h2 = hash_canonical_hex(&sample(2)).unwrap();
        let h3 = hash_canonical_hex(&sample(3)).unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_write_with_digest_creates_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("best_model.json");

        let digest = write_with_digest(&path, &sample(5)).unwrap();
        assert_eq!(read_digest(&path).unwrap().as_deref(), Some(digest.as_str()));
        assert_eq!(digest, digest_hex(&fs::read(&path).unwrap()));
        assert!(dir.path().join("models").join("best_model.hash").exists());
    }

    #[test]
    fn test_missing_sidecar_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_digest(&dir.path().join("x.json")).unwrap().is_none());
    }
}
