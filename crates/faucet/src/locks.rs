//! Per-key mutual exclusion for ledger read-check-write sequences.

use moka::sync::Cache;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily-created async mutexes keyed by string.
///
/// The cache bounds how many idle locks stay resident; a held guard keeps its
/// mutex alive through the `Arc` even if the entry is evicted.
pub struct KeyedLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new(max_keys: u64) -> Self {
        Self {
            locks: Cache::new(max_keys),
        }
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .get_with(key.to_string(), || Arc::new(Mutex::new(())));
        mutex.lock_owned().await
    }
}
