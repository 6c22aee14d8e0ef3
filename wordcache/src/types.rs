//! Key-value store types and traits

use serde::Deserialize;
use std::future::Future;

use crate::error::StoreError;

/// What `Datastore::open` does with a snapshot file that fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptPolicy {
    /// Fail the open with `StoreError::Corrupt`
    #[default]
    Fail,
    /// Log a warning and start from an empty mapping. The corrupt file is
    /// replaced on the next successful close.
    StartEmpty,
}

/// Options for `Datastore::open_with`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub on_corrupt: CorruptPolicy,
    /// fsync the temporary snapshot file before renaming it into place
    pub sync_on_close: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            on_corrupt: CorruptPolicy::Fail,
            sync_on_close: true,
        }
    }
}

/// Trait for string key-value stores
///
/// Implementations are safe to call from any number of concurrent tasks.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`
    ///
    /// Fails with `StoreError::NotFound` if the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Insert or overwrite `key`
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
