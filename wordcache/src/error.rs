//! Error types for the lock table, the snapshot codec and the store

use std::path::PathBuf;

/// Errors from the key lock table
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Unlock of a key the caller does not hold
    #[error("lock not held: {0}")]
    NotHeld(String),
}

/// Errors from the snapshot codec
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Bytes are not a valid snapshot (truncated, malformed, unknown version)
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    /// The mapping could not be serialized
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors returned by `Datastore`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `get` on an absent key. Callers treat it as a cache miss.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Lock discipline violation inside an operation
    #[error("lock not held: {0}")]
    NotHeld(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The store was closed; no operation is valid afterwards
    #[error("datastore is closed")]
    Closed,
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::NotHeld(key) => Self::NotHeld(key),
        }
    }
}

impl StoreError {
    /// True for the expected cache-miss condition
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
