use awsecssrv_core::{AddressSet, CacheReadFailure, Error, SharedCache, Ttl};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, time::Duration};
use tokio::time::Instant;
use tracing::{debug, trace};

/// An in-process [`SharedCache`].
///
/// Values are stored serialized, with an expiry, exactly as a remote backend
/// would store them. Writers take a short-lived exclusive lock named
/// `<key>:mutex`; a writer that finds the lock held skips its write, since
/// the holder is already populating the entry for this round. Locks expire
/// on their own after `lock_ttl` so that a writer that never releases its
/// lock cannot wedge the key.
pub struct MemoryCache {
    lock_ttl: Duration,
    state: Mutex<State>,
}

/// Holds a key's write lock until dropped.
#[must_use = "the lock is released when dropped"]
pub struct KeyLock<'c> {
    cache: &'c MemoryCache,
    name: String,
    id: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    locks: HashMap<String, Lock>,
    next_lock_id: u64,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct Lock {
    id: u64,
    expires_at: Instant,
}

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(1);

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

// === impl MemoryCache ===

impl MemoryCache {
    pub fn new(lock_ttl: Duration) -> Self {
        Self {
            lock_ttl,
            state: Mutex::new(State::default()),
        }
    }

    /// Attempts to take the write lock for `key`.
    ///
    /// Returns `None` if another writer holds an unexpired lock.
    pub fn lock(&self, key: &str) -> Option<KeyLock<'_>> {
        let name = format!("{key}:mutex");
        let now = Instant::now();
        let mut state = self.state.lock();
        if let Some(lock) = state.locks.get(&name) {
            if lock.expires_at > now {
                return None;
            }
            trace!(lock = %name, "Replacing expired lock");
        }
        let id = state.next_lock_id;
        state.next_lock_id += 1;
        state.locks.insert(
            name.clone(),
            Lock {
                id,
                expires_at: deadline(now, self.lock_ttl),
            },
        );
        Some(KeyLock {
            cache: self,
            name,
            id,
        })
    }

    /// Drops every expired entry and lock. Every write also does this, so
    /// entries for keys that are never read again do not accumulate.
    pub fn purge_expired(&self) {
        self.state.lock().purge(Instant::now());
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut state = self.state.lock();
        match state.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                trace!(%key, "Entry expired");
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn write(&self, key: &str, ttl: Ttl, value: Vec<u8>) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.purge(now);
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: deadline(now, ttl.as_duration()),
            },
        );
    }
}

// === impl State ===

impl State {
    fn purge(&mut self, now: Instant) {
        let entries = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        self.locks.retain(|_, l| l.expires_at > now);
        if self.entries.len() < entries {
            trace!(purged = entries - self.entries.len(), "Purged expired entries");
        }
    }
}

/// Saturates at the far future rather than overflowing the clock.
fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TTL)
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryCache")
            .field("lock_ttl", &self.lock_ttl)
            .field("entries", &state.entries.len())
            .field("locks", &state.locks.len())
            .finish()
    }
}

#[async_trait::async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<AddressSet>, Error> {
        match self.read(key) {
            Some(bytes) => {
                let addrs = serde_json::from_slice(&bytes).map_err(CacheReadFailure::new)?;
                Ok(Some(addrs))
            }
            None => Ok(None),
        }
    }

    async fn set_with_mutex(&self, key: &str, ttl: Ttl, value: &AddressSet) -> Result<(), Error> {
        let Some(_lock) = self.lock(key) else {
            debug!(%key, "Another writer holds the lock; skipping write");
            return Ok(());
        };
        let bytes = serde_json::to_vec(value)?;
        self.write(key, ttl, bytes);
        trace!(%key, ttl = ttl.as_secs(), addrs = %value, "Stored");
        Ok(())
    }
}

// === impl KeyLock ===

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        // The lock may have expired and been taken by another writer.
        if state.locks.get(&self.name).map(|l| l.id) == Some(self.id) {
            state.locks.remove(&self.name);
        }
    }
}

impl fmt::Debug for KeyLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLock").field("name", &self.name).finish()
    }
}
