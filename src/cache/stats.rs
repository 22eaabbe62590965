//! Cache Statistics Module
//!
//! Read-only introspection shared by both store kinds, plus the running
//! hit/miss/eviction counters each store keeps.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::entry::EntryMeta;
use crate::config::CacheConfig;

// == Cache Counters ==
/// Running operation counters kept by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that found nothing, an expired entry, or an unreadable one
    pub misses: u64,
    /// Entries removed by the LRU policy
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

// == Cache Stats ==
/// Snapshot of a store's contents and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of entries currently held, expired-but-unswept included
    pub size: usize,
    pub max_size: Option<usize>,
    pub enable_lru: bool,
    /// Smallest `last_accessed` across entries (Unix milliseconds)
    pub oldest_access: Option<u64>,
    /// Largest `last_accessed` across entries (Unix milliseconds)
    pub newest_access: Option<u64>,
    /// Keys in ascending order
    pub keys: Vec<String>,
    pub access_counts: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub counters: CacheCounters,
}

impl CacheStats {
    // == Report ==
    /// Aggregates entry metadata into a snapshot.
    ///
    /// Takes metadata by value so reporting can never touch the entries.
    pub fn report<K, I>(entries: I, config: &CacheConfig, counters: CacheCounters) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EntryMeta)>,
    {
        let mut stats = Self {
            max_size: config.max_size,
            enable_lru: config.enable_lru,
            counters,
            ..Self::default()
        };

        for (key, meta) in entries {
            let key = key.into();
            stats.oldest_access = Some(
                stats
                    .oldest_access
                    .map_or(meta.last_accessed, |t| t.min(meta.last_accessed)),
            );
            stats.newest_access = Some(
                stats
                    .newest_access
                    .map_or(meta.last_accessed, |t| t.max(meta.last_accessed)),
            );
            stats.access_counts.insert(key.clone(), meta.access_count);
            stats.keys.push(key);
        }

        stats.keys.sort();
        stats.size = stats.keys.len();
        stats
    }

    /// Adds keys whose metadata could not be read.
    ///
    /// They count toward `size` and `keys` but not toward access times or counts.
    pub fn with_unreadable<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.keys.extend(keys);
        self.keys.sort();
        self.size = self.keys.len();
        self
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.counters.hits + self.counters.misses;
        if total == 0 {
            0.0
        } else {
            self.counters.hits as f64 / total as f64
        }
    }

    /// Reduces the snapshot to the external `inspect` view.
    pub fn inspection(&self) -> CacheInspection {
        CacheInspection {
            size: self.size,
            keys: self.keys.clone(),
        }
    }
}

/// Size and key list of one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheInspection {
    pub size: usize,
    pub keys: Vec<String>,
}
