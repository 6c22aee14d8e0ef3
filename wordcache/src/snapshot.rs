//! Snapshot codec
//!
//! Serializes the whole key/value mapping to bytes and back. Used only when
//! the store is opened (decode) and closed (encode).
//!
//! The format is a JSON envelope private to this crate:
//!
//! ```text
//! {"version":1,"entries":{"1|haus":"house","2|hello":"hallo · servus"}}
//! ```
//!
//! Entries are written in key order, so equal mappings encode to equal bytes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::SnapshotError;

/// In-memory form of the store contents
pub type Mapping = HashMap<String, String>;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    entries: BTreeMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotIn {
    version: u32,
    entries: Mapping,
}

/// Encode a mapping into snapshot bytes
///
/// # Errors
///
/// Returns `SnapshotError::Encode` if serialization fails.
pub fn encode(mapping: &Mapping) -> Result<Vec<u8>, SnapshotError> {
    let out = SnapshotOut {
        version: SNAPSHOT_VERSION,
        entries: mapping
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect(),
    };
    Ok(serde_json::to_vec(&out)?)
}

/// Decode snapshot bytes into a mapping
///
/// An empty input is corrupt: a zero-length file is a truncated write,
/// not an empty store (the empty store encodes to a non-empty envelope).
///
/// # Errors
///
/// Returns `SnapshotError::Corrupt` if the bytes are not a valid snapshot.
pub fn decode(bytes: &[u8]) -> Result<Mapping, SnapshotError> {
    if bytes.is_empty() {
        return Err(SnapshotError::Corrupt("empty input".to_string()));
    }
    let snapshot: SnapshotIn =
        serde_json::from_slice(bytes).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Corrupt(format!(
            "unsupported version {}",
            snapshot.version
        )));
    }
    Ok(snapshot.entries)
}
