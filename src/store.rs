use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// The Store is responsible for managing key-value pairs, with an optional expiration for each
/// key. Expired keys are removed lazily when read and eagerly by `sweep_expired_keys`.
/// Expirations are measured on the monotonic tokio clock, so wall-clock adjustments never
/// expire or revive a key.
///
/// Every operation goes through a single lock, so reads, writes and evictions are serialized.
/// The store can be shared and cloned cheaply using reference counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
            ttls: BTreeSet::new(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InnerStore {
    state: Mutex<State>,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> InnerStoreLocked<'a> {
    /// Inserts or overwrites `key`. The previous value and its expiration are discarded.
    pub fn set(&mut self, key: String, data: Bytes, expires_at: Option<Instant>) {
        let value = Value { data, expires_at };
        if let Some(previous) = self.state.keys.insert(key.clone(), value) {
            self.forget_ttl(previous.expires_at, key.clone());
        }

        if let Some(expires_at) = expires_at {
            self.state.ttls.insert((expires_at, key));
        }
    }

    #[cfg(test)]
    pub fn set_with_ttl(&mut self, key: String, data: Bytes, ttl: Duration) {
        self.set(key, data, Some(Instant::now() + ttl));
    }

    /// Returns the value of `key`, evicting it first if it has expired.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = Instant::now();

        match self.state.keys.get(key) {
            Some(value) if value.is_expired(now) => {}
            Some(value) => return Some(value.data.clone()),
            None => return None,
        }

        debug!(key, "evicting expired key on read");
        self.remove(key);

        None
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.state.keys.remove(key)?;
        self.forget_ttl(value.expires_at, key.to_string());
        Some(value)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.state.keys.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.state.keys.len()
    }

    /// Removes every key whose expiration is at or before `now` and returns how many were
    /// removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired_keys: Vec<(Instant, String)> = self
            .state
            .ttls
            .iter()
            .take_while(|(expires_at, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (when, key) in &expired_keys {
            self.state.ttls.remove(&(*when, key.clone()));
            self.state.keys.remove(key);
        }

        expired_keys.len()
    }

    fn forget_ttl(&mut self, expires_at: Option<Instant>, key: String) {
        if let Some(expires_at) = expires_at {
            self.state.ttls.remove(&(expires_at, key));
        }
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // A panic while holding the lock can't leave the maps half-updated in a way later
        // operations depend on, so keep serving from the poisoned state.
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        InnerStoreLocked { state }
    }
}

type Key = String;

#[derive(Debug, PartialEq)]
pub struct Value {
    pub data: Bytes,
    pub expires_at: Option<Instant>,
}

impl Value {
    /// A value expiring exactly at `now` is still readable.
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }
}

struct State {
    keys: HashMap<Key, Value>,
    // Ordered by expiration so a sweep only walks the keys that are due.
    ttls: BTreeSet<(Instant, Key)>,
}

/// Periodically removes expired keys for as long as the process runs.
pub async fn sweep_expired_keys(store: Store, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let removed = store.lock().sweep(Instant::now());
        if removed > 0 {
            debug!(removed, "removed expired keys");
        }
    }
}
