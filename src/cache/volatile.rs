//! Volatile Store Module
//!
//! In-process cache engine combining HashMap storage with LRU tracking,
//! TTL expiration and per-entry expiry timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheCounters, CacheEntry, CacheStats, LruTracker};
use crate::config::{CacheConfig, ConfigOverrides};

// == Volatile Store ==
/// Bounded in-memory cache with LRU eviction and TTL support.
///
/// Cloning yields another handle to the same store. Every operation runs
/// under a single lock, so capacity checks, LRU selection and eviction are
/// one transaction.
pub struct VolatileStore<V> {
    inner: Arc<Mutex<VolatileInner<V>>>,
}

struct ExpiryTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct VolatileInner<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Pending expiry tasks by key
    timers: HashMap<String, ExpiryTimer>,
    counters: CacheCounters,
    config: CacheConfig,
}

impl<V> VolatileInner<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        self.cancel_timer(key);
        self.lru.remove(key);
        self.entries.remove(key)
    }

    fn cancel_timer(&mut self, key: &str) {
        if let Some(timer) = self.timers.remove(key) {
            timer.handle.abort();
        }
    }

    /// Evicts LRU entries until the store fits its configured capacity.
    fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.config.is_over_capacity(self.entries.len()) {
            let Some(key) = self.lru.evict_oldest() else {
                break;
            };
            self.cancel_timer(&key);
            self.entries.remove(&key);
            self.counters.record_eviction();
            debug!(key = %key, "Evicting LRU cache entry");
            evicted += 1;
        }
        evicted
    }

    fn remove_expired(&mut self, now: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove(key);
        }
        self.counters.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    /// Runs when an expiry task wakes up. Stale timers are ignored.
    fn expire_scheduled(&mut self, key: &str, generation: u64) {
        match self.timers.get(key) {
            Some(timer) if timer.generation == generation => {
                self.timers.remove(key);
            }
            _ => return,
        }

        if self.entries.get(key).is_some_and(|e| e.is_expired()) {
            self.lru.remove(key);
            self.entries.remove(key);
            self.counters.record_expirations(1);
            debug!(key = %key, "Expiry timer removed cache entry");
        }
    }
}

impl<V> Drop for VolatileInner<V> {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }
}

impl<V> Clone for VolatileStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> VolatileStore<V>
where
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a new VolatileStore with the default policy.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a new VolatileStore with the given policy.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VolatileInner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                timers: HashMap::new(),
                counters: CacheCounters::default(),
                config,
            })),
        }
    }

    // == Set ==
    /// Stores a value, overwriting any existing entry for `key`.
    ///
    /// `ttl` falls back to the configured default. A zero TTL removes the
    /// key instead of storing an entry nobody could read. After insertion the
    /// least recently used entries are evicted while the store is over
    /// capacity.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let mut inner = self.inner.lock();
        let ttl = ttl.unwrap_or(inner.config.default_ttl);

        if ttl.is_zero() {
            if inner.remove(&key).is_some() {
                debug!(key = %key, "Zero TTL write removed cache entry");
            }
            return;
        }

        let entry = match inner.entries.remove(&key) {
            Some(mut existing) => {
                existing.rewrite(value, ttl);
                existing
            }
            None => CacheEntry::new(value, ttl),
        };
        let generation = entry.access_seq;
        let stored_ttl = Duration::from_millis(entry.ttl_ms);

        inner.lru.touch(&key, generation);
        inner.entries.insert(key.clone(), entry);
        inner.cancel_timer(&key);
        self.schedule_expiry(&mut inner, &key, stored_ttl, generation);
        inner.enforce_capacity();
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed and reported as absent. With LRU enabled a
    /// hit promotes the entry to most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired_at(current_timestamp_ms()),
            None => {
                inner.counters.record_miss();
                return None;
            }
        };

        if expired {
            inner.remove(key);
            inner.counters.record_expirations(1);
            inner.counters.record_miss();
            debug!(key = %key, "Cache entry expired, removing");
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        if inner.config.enable_lru {
            entry.touch();
            inner.lru.touch(key, entry.access_seq);
        }
        let value = entry.data.clone();
        inner.counters.record_hit();
        Some(value)
    }

    // == Delete ==
    /// Removes an entry and cancels its expiry timer.
    ///
    /// Returns true if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    // == Clear ==
    /// Removes all entries and cancels all pending timers.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for (_, timer) in inner.timers.drain() {
            timer.handle.abort();
        }
        inner.entries.clear();
        inner.lru.clear();
    }

    // == Cleanup ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        self.inner.lock().remove_expired(current_timestamp_ms())
    }

    // == Configure ==
    /// Replaces the store policy.
    ///
    /// Shrinking `max_size` below the current size, or enabling LRU while
    /// over capacity, evicts immediately. Returns the number evicted.
    pub fn configure(&self, config: CacheConfig) -> usize {
        let mut inner = self.inner.lock();
        inner.config = config;
        let evicted = inner.enforce_capacity();
        if evicted > 0 {
            debug!(evicted, "Reconfiguration evicted cache entries");
        }
        evicted
    }

    /// Merges `overrides` into the current policy, evicting as `configure` does.
    pub fn apply(&self, overrides: &ConfigOverrides) -> usize {
        let mut inner = self.inner.lock();
        inner.config = inner.config.merge(overrides);
        inner.enforce_capacity()
    }

    pub fn config(&self) -> CacheConfig {
        self.inner.lock().config.clone()
    }

    // == Stats ==
    /// Returns a snapshot of the store. Does not touch any entry.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats::report(
            inner
                .entries
                .iter()
                .map(|(key, entry)| (key.as_str(), entry.meta())),
            &inner.config,
            inner.counters,
        )
    }

    /// Returns true if `key` holds a live entry, without promoting it.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Stored keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    // == Length ==
    /// Returns the current number of entries in the store.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Spawns a task that drops `key` once its TTL has elapsed.
    ///
    /// Without a Tokio runtime nothing is scheduled and expiry stays lazy.
    fn schedule_expiry(
        &self,
        inner: &mut VolatileInner<V>,
        key: &str,
        ttl: Duration,
        generation: u64,
    ) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        let store = Arc::downgrade(&self.inner);
        let task_key = key.to_string();
        let handle = runtime.spawn(async move {
            // still readable at exactly created_at + ttl
            tokio::time::sleep(ttl.saturating_add(Duration::from_millis(1))).await;
            if let Some(store) = store.upgrade() {
                store.lock().expire_scheduled(&task_key, generation);
            }
        });

        inner
            .timers
            .insert(key.to_string(), ExpiryTimer { generation, handle });
    }
}

impl<V> Default for VolatileStore<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
