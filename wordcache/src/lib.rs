//! Concurrent key-value cache with per-key locking and snapshot persistence
//!
//! ```no_run
//! use wordcache::{Datastore, KeyValueStore};
//!
//! # async fn demo() -> Result<(), wordcache::StoreError> {
//! let store = Datastore::open("cache.json").await?;
//! store.set("2|hello", "hallo · servus").await?;
//! assert_eq!(store.get("2|hello").await?, "hallo · servus");
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod keylock;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export error types for convenience
pub use error::{LockError, SnapshotError, StoreError};

// Re-export lock table types for convenience
pub use keylock::{DrainBarrier, KeyGuard, KeyLockTable};

// Re-export store types for convenience
pub use snapshot::Mapping;
pub use store::Datastore;
pub use types::{CorruptPolicy, KeyValueStore, StoreOptions};
