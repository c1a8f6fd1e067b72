//! Named locks for serializing mutations against one remote resource
//!
//! Rule changes against the same security group must not interleave. Each
//! orchestrator holds a [`KeyedMutex`] (cheap to clone, shared state) and
//! takes a [`KeyedGuard`] for the duration of one critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<String, Arc<AsyncMutex<()>>>;

/// Async mutex registry keyed by resource name
#[derive(Clone, Default)]
pub struct KeyedMutex {
    locks: Arc<Mutex<LockTable>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let entry = {
            let mut table = lock_table(&self.locks);
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        tracing::debug!("Waiting for lock on {}", key);
        let guard = entry.lock_owned().await;
        tracing::debug!("Acquired lock on {}", key);

        KeyedGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Take `key` if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyedGuard> {
        let mut table = lock_table(&self.locks);
        let entry = table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = entry.try_lock_owned().ok()?;
        Some(KeyedGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        })
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        lock_table(&self.locks).len()
    }
}

fn lock_table(locks: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    // the table stays consistent even if a holder panicked
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// RAII guard for one named lock
pub struct KeyedGuard {
    key: String,
    locks: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let entry = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);

        let mut table = lock_table(&self.locks);
        // only the table and `entry` left: no holder, no waiter
        if Arc::strong_count(&entry) == 2 {
            table.remove(&self.key);
        }
        tracing::debug!("Released lock on {}", self.key);
    }
}
