//! Persistent Store Adapter
//!
//! Layers the volatile store's TTL and LRU semantics over an external
//! string-only store. Entries are serialized as JSON; expiry is checked
//! lazily because nothing can run timers against storage this process does
//! not control.
//!
//! Every failure (missing backend, corrupt entry, rejected write) is logged
//! and absorbed: callers see a miss or a no-op, never an error.

use std::time::Duration;

use parking_lot::Mutex;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::entry::{current_timestamp_ms, EntryMeta};
use crate::cache::{CacheCounters, CacheEntry, CacheStats, KeyNamespacer};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::KeyValueStorage;

/// Cache adapter over a host-provided [`KeyValueStorage`].
pub struct PersistentStore {
    storage: Option<Box<dyn KeyValueStorage>>,
    namespacer: KeyNamespacer,
    /// Counters; also serializes operations so each one is a single transaction
    state: Mutex<CacheCounters>,
}

impl PersistentStore {
    pub fn new(storage: impl KeyValueStorage + 'static, namespacer: KeyNamespacer) -> Self {
        Self::from_storage(Some(Box::new(storage)), namespacer)
    }

    /// An adapter whose backend does not exist: a permanently empty cache.
    pub fn unavailable(namespacer: KeyNamespacer) -> Self {
        Self::from_storage(None, namespacer)
    }

    pub fn from_storage(
        storage: Option<Box<dyn KeyValueStorage>>,
        namespacer: KeyNamespacer,
    ) -> Self {
        Self {
            storage,
            namespacer,
            state: Mutex::new(CacheCounters::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    // == Set ==
    /// Serializes and stores `value` under `key`.
    ///
    /// New keys first make room according to `config`; existing keys are
    /// overwritten in place without consulting capacity. A zero TTL removes
    /// the key.
    pub fn set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
        config: &CacheConfig,
    ) {
        let key = self.namespacer.qualify(key);
        let mut counters = self.state.lock();
        let ttl = ttl.unwrap_or(config.default_ttl);
        let result = self.try_set(&key, value, ttl, config, &mut counters);
        absorb("set", &key, result);
    }

    // == Get ==
    /// Reads `key`, refreshing its recency on a hit.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let key = self.namespacer.qualify(key);
        let mut counters = self.state.lock();
        let value = absorb("get", &key, self.try_get(&key, &mut counters)).flatten();
        if value.is_some() {
            counters.record_hit();
        } else {
            counters.record_miss();
        }
        value
    }

    // == Delete ==
    pub fn delete(&self, key: &str) -> bool {
        let key = self.namespacer.qualify(key);
        let _guard = self.state.lock();
        let result = self.storage().and_then(|storage| {
            let existed = storage.get_item(&key)?.is_some();
            storage.remove_item(&key)?;
            Ok(existed)
        });
        absorb("delete", &key, result).unwrap_or(false)
    }

    // == Clear ==
    /// Removes every key in this namespace, leaving foreign keys alone.
    ///
    /// Returns the number of keys removed.
    pub fn clear(&self) -> usize {
        let _guard = self.state.lock();
        let result = self.storage().and_then(|storage| {
            let keys = self.owned_keys(storage)?;
            for key in &keys {
                storage.remove_item(key)?;
            }
            Ok(keys.len())
        });
        absorb("clear", self.namespacer.prefix(), result).unwrap_or(0)
    }

    // == Purge Expired ==
    /// Removes expired and unreadable entries in this namespace.
    ///
    /// Returns the number of keys removed.
    pub fn purge_expired(&self) -> usize {
        let mut counters = self.state.lock();
        let now = current_timestamp_ms();
        let result = self.storage().and_then(|storage| {
            let mut removed = 0;
            for key in self.owned_keys(storage)? {
                let stale = match storage.get_item(&key)? {
                    Some(raw) => parse_meta(&raw).map_or(true, |meta| meta.is_expired_at(now)),
                    None => false,
                };
                if stale {
                    storage.remove_item(&key)?;
                    removed += 1;
                }
            }
            Ok(removed)
        });
        let removed = absorb("purge", self.namespacer.prefix(), result).unwrap_or(0);
        counters.record_expirations(removed);
        removed
    }

    // == Stats ==
    /// Snapshot computed by enumeration. Reads only; never writes back.
    ///
    /// Unreadable entries count toward `size` and `keys`, matching what
    /// capacity enforcement sees, but not toward access times or counts.
    pub fn stats(&self, config: &CacheConfig) -> CacheStats {
        let counters = self.state.lock();
        let result = self.storage().and_then(|storage| {
            let mut entries = Vec::new();
            let mut unreadable = Vec::new();
            for key in self.owned_keys(storage)? {
                if let Some(raw) = storage.get_item(&key)? {
                    match parse_meta(&raw) {
                        Some(meta) => entries.push((key, meta)),
                        None => unreadable.push(key),
                    }
                }
            }
            Ok((entries, unreadable))
        });
        let (entries, unreadable) =
            absorb("stats", self.namespacer.prefix(), result).unwrap_or_default();
        CacheStats::report(entries, config, *counters).with_unreadable(unreadable)
    }

    /// Returns true if `key` holds a live, readable entry. Does not promote.
    pub fn contains(&self, key: &str) -> bool {
        let key = self.namespacer.qualify(key);
        let _guard = self.state.lock();
        let result = self.storage().and_then(|storage| storage.get_item(&key));
        absorb("contains", &key, result)
            .flatten()
            .and_then(|raw| parse_meta(&raw))
            .is_some_and(|meta| !meta.is_expired_at(current_timestamp_ms()))
    }

    /// Keys in this namespace, ascending.
    pub fn keys(&self) -> Vec<String> {
        let _guard = self.state.lock();
        let result = self.storage().and_then(|storage| self.owned_keys(storage));
        let mut keys = absorb("keys", self.namespacer.prefix(), result).unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn storage(&self) -> Result<&dyn KeyValueStorage> {
        self.storage
            .as_deref()
            .ok_or(CacheError::StorageUnavailable)
    }

    fn owned_keys(&self, storage: &dyn KeyValueStorage) -> Result<Vec<String>> {
        Ok(self.namespacer.owned_keys(storage.keys()?))
    }

    fn try_set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl: Duration,
        config: &CacheConfig,
        counters: &mut CacheCounters,
    ) -> Result<()> {
        let storage = self.storage()?;

        if ttl.is_zero() {
            storage.remove_item(key)?;
            debug!(key = %key, "Zero TTL write removed persistent entry");
            return Ok(());
        }

        let existing = storage.get_item(key)?;
        if existing.is_none() && config.enable_lru {
            if let Some(max_size) = config.max_size {
                if max_size == 0 {
                    debug!(key = %key, "Persistent cache has zero capacity, skipping write");
                    return Ok(());
                }
                self.make_room(storage, max_size, counters)?;
            }
        }

        let mut entry = CacheEntry::new(value, ttl);
        if let Some(previous) = existing.as_deref().and_then(parse_meta) {
            entry.access_count = previous.access_count.saturating_add(1);
        }
        storage.set_item(key, &serde_json::to_string(&entry)?)
    }

    fn try_get<V: DeserializeOwned>(
        &self,
        key: &str,
        counters: &mut CacheCounters,
    ) -> Result<Option<V>> {
        let storage = self.storage()?;
        let Some(raw) = storage.get_item(key)? else {
            return Ok(None);
        };

        let mut entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Unreadable persistent entry treated as miss");
                return Ok(None);
            }
        };

        if entry.is_expired() {
            storage.remove_item(key)?;
            counters.record_expirations(1);
            debug!(key = %key, "Persistent entry expired, removing");
            return Ok(None);
        }

        let value = match V::deserialize(&entry.data) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Stored value has unexpected shape");
                return Ok(None);
            }
        };

        entry.touch();
        match serde_json::to_string(&entry) {
            Ok(serialized) => {
                if let Err(e) = storage.set_item(key, &serialized) {
                    warn!(key = %key, error = %e, "Failed to refresh persistent entry recency");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to re-serialize persistent entry"),
        }
        Ok(Some(value))
    }

    /// Evicts least recently used keys until one more entry fits under `max_size`.
    ///
    /// Unreadable entries sort first and go before any live one.
    fn make_room(
        &self,
        storage: &dyn KeyValueStorage,
        max_size: usize,
        counters: &mut CacheCounters,
    ) -> Result<()> {
        let keys = self.owned_keys(storage)?;
        if keys.len() < max_size {
            return Ok(());
        }

        let mut candidates = Vec::with_capacity(keys.len());
        for key in keys {
            let recency = storage
                .get_item(&key)?
                .as_deref()
                .and_then(parse_meta)
                .map_or((0, 0), |meta| meta.recency());
            candidates.push((recency, key));
        }
        candidates.sort();

        let excess = candidates.len() + 1 - max_size;
        for (_, key) in candidates.into_iter().take(excess) {
            storage.remove_item(&key)?;
            counters.record_eviction();
            debug!(key = %key, "Evicting LRU persistent entry");
        }
        Ok(())
    }
}

/// Reads entry metadata without decoding the value.
fn parse_meta(raw: &str) -> Option<EntryMeta> {
    serde_json::from_str::<CacheEntry<IgnoredAny>>(raw)
        .ok()
        .map(|entry| entry.meta())
}

fn absorb<T>(op: &str, key: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(CacheError::StorageUnavailable) => {
            debug!(op, key = %key, "Persistent storage unavailable");
            None
        }
        Err(e) => {
            warn!(op, key = %key, error = %e, "Persistent cache operation failed");
            None
        }
    }
}
