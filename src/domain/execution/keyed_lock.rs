//! Async mutex per key, entries removed once nobody holds or waits on them

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Entry {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters
    users: usize,
}

type LockMap<K> = Arc<Mutex<HashMap<K, Entry>>>;

pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: LockMap<K>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel-safe: a waiter dropped before acquiring releases its registration.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let (mutex, registration) = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            let entry = locks.entry(key.clone()).or_insert_with(|| Entry {
                mutex: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            entry.users += 1;
            (
                entry.mutex.clone(),
                Registration {
                    key,
                    locks: self.locks.clone(),
                },
            )
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently held or awaited
    pub fn active(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct Registration<K: Eq + Hash + Clone> {
    key: K,
    locks: LockMap<K>,
}

impl<K: Eq + Hash + Clone> Drop for Registration<K> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let idle = match locks.get_mut(&self.key) {
            Some(entry) => {
                entry.users -= 1;
                entry.users == 0
            }
            None => false,
        };
        if idle {
            locks.remove(&self.key);
        }
    }
}

/// Fields drop in order: the mutex is released before the registration.
pub struct KeyedGuard<K: Eq + Hash + Clone> {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<K>,
}
