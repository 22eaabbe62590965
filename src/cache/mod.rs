//! Cache Module
//!
//! Provides TTL expiration and LRU eviction over an in-process store and
//! over string-only persistent stores.

pub mod entry;
mod lru;
mod namespace;
mod persistent;
mod stats;
mod volatile;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, ttl_from_millis, CacheEntry, EntryMeta};
pub use lru::LruTracker;
pub use namespace::{fingerprint, KeyNamespacer, DEFAULT_NAMESPACE};
pub use persistent::PersistentStore;
pub use stats::{CacheCounters, CacheInspection, CacheStats};
pub use volatile::VolatileStore;
