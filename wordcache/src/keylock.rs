//! Key Lock Table
//!
//! Per-key exclusive locks for async tasks. Tasks locking different keys
//! never wait on each other; a key is never held by two tasks at once.
//!
//! # 1) Locking a key
//!
//! 10. Client: call `lock(key)`
//! 20. Table: take the table guard
//! 30. Table: no entry for `key`? Create one holding a fresh, already
//!     acquired handle, waiters=1. Release the table guard. Done.
//! 40. Table: otherwise increment waiters and clone the entry's handle
//! 50. Table: release the table guard
//! 60. Client: await the handle
//!
//! The step 60 must come after the step 50. `unlock` needs the table guard
//! too, so a client waiting on a handle while holding the table guard would
//! prevent the current holder from ever unlocking, and both would hang.
//!
//! # 2) Unlocking a key
//!
//! Unlocking takes the `KeyGuard` returned by `lock`, so only the holder can
//! release a key.
//!
//! 10. Take the table guard
//! 20. No entry, or the entry is held by another acquisition? Fail with
//!     `NotHeld`.
//! 30. Release the handle, decrement waiters
//! 40. waiters == 0? Remove the entry.
//!
//! The table guard is a `parking_lot::Mutex` and is only ever held for the
//! bookkeeping above, never across an `.await`.
//!
//! # 3) Cancellation
//!
//! A `lock` future dropped while queued (for example, raced against
//! `tokio::time::timeout`) withdraws its waiter count, so abandoned waits do
//! not leak table entries.
//!
//! # 4) Drain barrier
//!
//! `DrainBarrier` is the shared/exclusive gate layered over the table.
//! Key operations `enter` it in shared mode, shutdown `seal`s it in exclusive
//! mode once every in-flight operation has left.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::error::LockError;

// ============================================================================
// Table State
// ============================================================================

/// Identifies one particular acquisition of a key
type Ticket = u64;

struct Holder {
    ticket: Ticket,
    _guard: OwnedMutexGuard<()>,
}

struct Entry {
    handle: Arc<tokio::sync::Mutex<()>>,
    /// `None` while the handle is being passed from an unlocker to a waiter
    holder: Option<Holder>,
    /// Holder plus queued waiters
    waiters: usize,
}

struct TableState {
    entries: HashMap<String, Entry>,
    next_ticket: Ticket,
}

impl TableState {
    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Drop one waiter from `key`, removing the entry when none are left
    fn withdraw(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.waiters = entry.waiters.saturating_sub(1);
            if entry.waiters == 0 {
                self.entries.remove(key);
            }
        }
    }
}

// ============================================================================
// Key Lock Table
// ============================================================================

/// Thread-safe table of per-key exclusive locks
///
/// Clones share the same table.
#[derive(Clone)]
pub struct KeyLockTable {
    inner: Arc<Mutex<TableState>>,
}

impl KeyLockTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableState {
                entries: HashMap::new(),
                next_ticket: 0,
            })),
        }
    }

    /// Lock `key`, waiting until no other task holds it
    ///
    /// The lock is released when the returned guard is dropped or
    /// `KeyGuard::unlock` is called.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let handle = {
            let mut state = self.inner.lock();
            if let Some(entry) = state.entries.get_mut(key) {
                entry.waiters += 1;
                Arc::clone(&entry.handle)
            } else {
                let ticket = Self::insert_held(&mut state, key);
                return self.guard(key, ticket);
            }
        };

        debug!(key, "keylock: contended, waiting");
        let mut pending = PendingWaiter {
            table: self,
            key,
            armed: true,
        };
        let acquired = handle.lock_owned().await;
        pending.armed = false;

        let mut state = self.inner.lock();
        let ticket = state.issue_ticket();
        // Our waiter count keeps the entry alive until we unlock
        if let Some(entry) = state.entries.get_mut(key) {
            entry.holder = Some(Holder {
                ticket,
                _guard: acquired,
            });
        }
        drop(state);
        self.guard(key, ticket)
    }

    /// Lock `key` if nobody holds or waits for it
    #[must_use]
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        let mut state = self.inner.lock();
        if state.entries.contains_key(key) {
            return None;
        }
        let ticket = Self::insert_held(&mut state, key);
        drop(state);
        Some(self.guard(key, ticket))
    }

    /// Release the hold represented by `guard`
    ///
    /// Only the holder can unlock a key: a task that never locked it has no
    /// guard to pass. Equivalent to `KeyGuard::unlock` for guards issued by
    /// this table.
    ///
    /// # Errors
    ///
    /// Returns `LockError::NotHeld` if `guard` was issued by another table.
    /// This table is left unchanged; the foreign guard is dropped and so
    /// released on its own table.
    pub fn unlock(&self, guard: KeyGuard) -> Result<(), LockError> {
        if !Arc::ptr_eq(&self.inner, &guard.table.inner) {
            warn!(key = %guard.key, "keylock: unlock with a guard from another table");
            return Err(LockError::NotHeld(guard.key.clone()));
        }
        guard.unlock()
    }

    /// True if some task currently holds `key`
    #[must_use]
    pub fn is_locked(&self, key: &str) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.holder.is_some())
    }

    /// Number of tasks holding or queued for `key`
    #[must_use]
    pub fn waiters(&self, key: &str) -> usize {
        self.inner
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.waiters)
    }

    /// Number of keys currently held or waited for
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    fn insert_held(state: &mut TableState, key: &str) -> Ticket {
        let handle = Arc::new(tokio::sync::Mutex::new(()));
        let ticket = state.issue_ticket();
        // A fresh mutex is always free
        let holder = Arc::clone(&handle)
            .try_lock_owned()
            .ok()
            .map(|guard| Holder {
                ticket,
                _guard: guard,
            });
        state.entries.insert(
            key.to_string(),
            Entry {
                handle,
                holder,
                waiters: 1,
            },
        );
        ticket
    }

    fn guard(&self, key: &str, ticket: Ticket) -> KeyGuard {
        KeyGuard {
            table: self.clone(),
            key: key.to_string(),
            ticket,
            released: false,
        }
    }

    fn release(&self, key: &str, ticket: Ticket) -> Result<(), LockError> {
        let mut state = self.inner.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            return Err(LockError::NotHeld(key.to_string()));
        };
        let owns = entry
            .holder
            .as_ref()
            .is_some_and(|holder| holder.ticket == ticket);
        if !owns {
            return Err(LockError::NotHeld(key.to_string()));
        }
        // Dropping the holder wakes the next queued waiter, if any
        entry.holder = None;
        state.withdraw(key);
        Ok(())
    }
}

impl Default for KeyLockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyLockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("KeyLockTable")
            .field("keys", &state.entries.len())
            .finish()
    }
}

/// Withdraws a queued waiter if its `lock` future is dropped before acquiring
struct PendingWaiter<'a> {
    table: &'a KeyLockTable,
    key: &'a str,
    armed: bool,
}

impl Drop for PendingWaiter<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(key = self.key, "keylock: waiter cancelled");
            self.table.inner.lock().withdraw(self.key);
        }
    }
}

// ============================================================================
// Key Guard
// ============================================================================

/// Exclusive hold on one key of a `KeyLockTable`
///
/// Dropping the guard unlocks the key.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard {
    table: KeyLockTable,
    key: String,
    ticket: Ticket,
    released: bool,
}

impl KeyGuard {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Unlock the key explicitly
    ///
    /// # Errors
    ///
    /// Returns `LockError::NotHeld` if the table no longer records this
    /// acquisition as the holder of the key.
    pub fn unlock(mut self) -> Result<(), LockError> {
        self.released = true;
        self.table.release(&self.key, self.ticket)
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.table.release(&self.key, self.ticket) {
            warn!("keylock: release on drop failed: {e}");
        }
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Drain Barrier
// ============================================================================

/// Shared/exclusive gate between key operations and shutdown
///
/// `tokio::sync::RwLock` is write-preferring: once `seal` is waiting,
/// new `enter` calls queue behind it, so shutdown cannot be starved.
#[derive(Debug, Default)]
pub struct DrainBarrier {
    sealed: RwLock<bool>,
}

impl DrainBarrier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter in shared mode for the duration of one key operation
    ///
    /// Returns `None` once the barrier is sealed.
    pub async fn enter(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let passage = self.sealed.read().await;
        if *passage {
            None
        } else {
            Some(passage)
        }
    }

    /// Wait for in-flight operations to drain, then seal the barrier
    ///
    /// The returned guard keeps new operations out until it is dropped;
    /// after that they fail to `enter`. Writing `false` through the guard
    /// before dropping it reopens the barrier. Returns `None` if already
    /// sealed.
    pub async fn seal(&self) -> Option<RwLockWriteGuard<'_, bool>> {
        let mut gate = self.sealed.write().await;
        if *gate {
            warn!("drain barrier: already sealed");
            return None;
        }
        *gate = true;
        Some(gate)
    }

    /// Non-blocking check, for use where `&mut self` is available
    pub fn is_sealed_mut(&mut self) -> bool {
        *self.sealed.get_mut()
    }
}
