//! Response Cache - key/value caching with TTL expiration and LRU eviction
//!
//! The same eviction and expiry policy runs over an in-process volatile
//! store and over string-only persistent stores supplied by the host.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;

pub use api::{Backend, ResponseCache, ResponseCacheBuilder};
pub use cache::{CacheStats, KeyNamespacer, PersistentStore, VolatileStore};
pub use config::{CacheConfig, Config, ConfigOverrides};
pub use error::{CacheError, Result};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use tasks::spawn_cleanup_task;
