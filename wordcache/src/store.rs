//! Persistent key-value store
//!
//! An in-memory string map guarded key-by-key through a `KeyLockTable`,
//! loaded from a snapshot file on open and written back on close.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  DrainBarrier                       │
//! │  - shared: get / set / delete       │
//! │  - exclusive: close                 │
//! └─────────────────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  KeyLockTable                       │
//! │  - one holder per key               │
//! │  - unrelated keys never contend     │
//! └─────────────────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Mapping (in memory)                │
//! │  - short-held map mutex             │
//! └─────────────────────────────────────┘
//!          │ open: decode / close: encode
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  snapshot file                      │
//! │  - written to <path>.tmp, renamed   │
//! └─────────────────────────────────────┘
//! ```

use parking_lot::Mutex;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::keylock::{DrainBarrier, KeyLockTable};
use crate::snapshot::{self, Mapping};
use crate::types::{CorruptPolicy, KeyValueStore, StoreOptions};

/// Key-value store persisted as a single snapshot file
///
/// Share it between tasks with `Arc<Datastore>`. Every operation is safe to
/// call concurrently; `close` waits for in-flight operations to finish, and
/// once it succeeds the store is closed for good.
pub struct Datastore {
    path: PathBuf,
    options: StoreOptions,
    data: Mutex<Mapping>,
    locks: KeyLockTable,
    barrier: DrainBarrier,
}

impl Datastore {
    /// Open the store at `path` with default options
    ///
    /// # Errors
    ///
    /// See `open_with`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default()).await
    }

    /// Open the store at `path`
    ///
    /// A missing file is not an error: the store starts empty and an empty
    /// snapshot is written to `path` right away.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` on any filesystem error other than "not found"
    /// - `StoreError::Corrupt` if the file does not decode, unless
    ///   `options.on_corrupt` is `CorruptPolicy::StartEmpty`
    pub async fn open_with(
        path: impl AsRef<Path>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match snapshot::decode(&bytes) {
                Ok(data) => {
                    info!(path = %path.display(), entries = data.len(), "datastore: loaded");
                    data
                }
                Err(e) => match options.on_corrupt {
                    CorruptPolicy::Fail => {
                        return Err(StoreError::Corrupt {
                            path,
                            reason: e.to_string(),
                        })
                    }
                    CorruptPolicy::StartEmpty => {
                        warn!(path = %path.display(), "datastore: {e}, starting empty");
                        Mapping::new()
                    }
                },
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let data = Mapping::new();
                let bytes = encode_snapshot(&path, &data)?;
                write_snapshot(&path, &bytes, options.sync_on_close).await?;
                info!(path = %path.display(), "datastore: created");
                data
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            options,
            data: Mutex::new(data),
            locks: KeyLockTable::new(),
            barrier: DrainBarrier::new(),
        })
    }

    /// Location of the snapshot file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Closed` after `close`.
    pub async fn len(&self) -> Result<usize, StoreError> {
        let _passage = self.barrier.enter().await.ok_or(StoreError::Closed)?;
        Ok(self.data.lock().len())
    }

    /// # Errors
    ///
    /// Returns `StoreError::Closed` after `close`.
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Drain in-flight operations and write the snapshot
    ///
    /// Once the snapshot is written the store is closed for good. If writing
    /// fails, the previous snapshot file is left untouched, the in-memory
    /// state is kept and the store accepts operations again, so `close` can
    /// be retried.
    ///
    /// # Errors
    ///
    /// - `StoreError::Closed` if the store was already closed
    /// - `StoreError::Io` if the snapshot could not be written
    pub async fn close(&self) -> Result<(), StoreError> {
        let mut sealed = self.barrier.seal().await.ok_or(StoreError::Closed)?;
        debug_assert!(self.locks.is_empty(), "key locks held after drain");

        let (bytes, entries) = {
            let data = self.data.lock();
            (encode_snapshot(&self.path, &data), data.len())
        };
        let written = match bytes {
            Ok(bytes) => write_snapshot(&self.path, &bytes, self.options.sync_on_close).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            *sealed = false;
            warn!(
                path = %self.path.display(),
                entries,
                "datastore: close failed, store stays open: {e}"
            );
            return Err(e);
        }

        self.data.lock().clear();
        info!(path = %self.path.display(), entries, "datastore: closed");
        Ok(())
    }
}

impl KeyValueStore for Datastore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let _passage = self.barrier.enter().await.ok_or(StoreError::Closed)?;
        let guard = self.locks.lock(key).await;
        let value = self.data.lock().get(key).cloned();
        guard.unlock()?;
        value.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _passage = self.barrier.enter().await.ok_or(StoreError::Closed)?;
        let guard = self.locks.lock(key).await;
        self.data.lock().insert(key.to_string(), value.to_string());
        guard.unlock()?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _passage = self.barrier.enter().await.ok_or(StoreError::Closed)?;
        let guard = self.locks.lock(key).await;
        if self.data.lock().remove(key).is_none() {
            debug!(key, "datastore: delete of absent key");
        }
        guard.unlock()?;
        Ok(())
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        if !self.barrier.is_sealed_mut() {
            warn!(
                path = %self.path.display(),
                "datastore: dropped without close, changes since open are lost"
            );
        }
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("path", &self.path)
            .field("entries", &self.data.lock().len())
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

/// Sibling of `path` used for the atomic replace
fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn encode_snapshot(path: &Path, data: &Mapping) -> Result<Vec<u8>, StoreError> {
    snapshot::encode(data).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })
}

/// Write `bytes` to `<path>.tmp`, then rename it over `path`
///
/// A crash mid-write leaves at worst a stray temporary file; `path` always
/// holds either the old or the new complete snapshot.
async fn write_snapshot(path: &Path, bytes: &[u8], sync: bool) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    if let Err(source) = write_file(&tmp, bytes, sync).await {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            debug!(path = %tmp.display(), "datastore: cleanup of temporary file failed: {e}");
        }
        return Err(StoreError::Io { path: tmp, source });
    }

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, bytes: &[u8], sync: bool) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    if sync {
        file.sync_all().await?;
    }
    Ok(())
}
