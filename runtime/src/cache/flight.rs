//! Per-key single-flight locks for cache fills.
//!
//! Concurrent misses for the same virtual URL queue behind one async mutex
//! so only the first performs the backend call; the rest re-check the cache
//! once they get the lock. Distinct keys never share a lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of in-flight fills keyed by cache key.
#[derive(Debug, Default)]
pub struct InFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held while a fill for one key is in progress.
///
/// Dropping the guard releases the key and forgets it once no other task
/// is waiting on it. A guard still waiting for the lock holds `None`.
pub struct FlightGuard<'a> {
    registry: &'a InFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Dropping the future while it waits also releases the key.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Declared before the wait so it drops after it on cancellation.
        let mut flight = FlightGuard {
            registry: self,
            key: key.to_string(),
            guard: None,
        };
        let wait = lock.lock_owned();
        flight.guard = Some(wait.await);
        flight
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Release before checking the count: the guard holds one Arc.
        self.guard.take();
        self.registry
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
