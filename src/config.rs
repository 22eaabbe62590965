//! Configuration Module
//!
//! Cache policy configuration plus process-level settings loaded from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_NAMESPACE;

// == Cache Config ==
/// Eviction and expiry policy for a single store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound on entry count, None = unbounded
    pub max_size: Option<usize>,
    /// TTL used when a write omits one
    pub default_ttl: Duration,
    /// When false, capacity is not enforced and only expiry removes entries
    pub enable_lru: bool,
}

impl CacheConfig {
    /// Default maximum number of entries.
    pub const DEFAULT_MAX_SIZE: usize = 100;
    /// Default time-to-live (5 minutes).
    pub const DEFAULT_TTL_MS: u64 = 300_000;

    /// Creates a config with no capacity bound.
    pub fn unbounded() -> Self {
        Self {
            max_size: None,
            ..Self::default()
        }
    }

    /// Sets the capacity bound.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Sets the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables or disables LRU eviction.
    pub fn with_lru(mut self, enable_lru: bool) -> Self {
        self.enable_lru = enable_lru;
        self
    }

    // == Merge ==
    /// Returns a new config with every field present in `overrides` applied.
    ///
    /// Pure: `self` is left untouched.
    pub fn merge(&self, overrides: &ConfigOverrides) -> Self {
        Self {
            max_size: overrides.max_size.or(self.max_size),
            default_ttl: overrides.default_ttl.unwrap_or(self.default_ttl),
            enable_lru: overrides.enable_lru.unwrap_or(self.enable_lru),
        }
    }

    /// Returns true if `len` entries exceed the capacity bound under this policy.
    pub fn is_over_capacity(&self, len: usize) -> bool {
        match self.max_size {
            Some(max) if self.enable_lru => len > max,
            _ => false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: Some(Self::DEFAULT_MAX_SIZE),
            default_ttl: Duration::from_millis(Self::DEFAULT_TTL_MS),
            enable_lru: true,
        }
    }
}

// == Config Overrides ==
/// Partial policy update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub max_size: Option<usize>,
    pub default_ttl: Option<Duration>,
    pub enable_lru: Option<bool>,
}

impl ConfigOverrides {
    pub fn max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..Self::default()
        }
    }

    pub fn enable_lru(enable_lru: bool) -> Self {
        Self {
            enable_lru: Some(enable_lru),
            ..Self::default()
        }
    }
}

/// Process-level settings.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries per store, None = unbounded
    pub max_entries: Option<usize>,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Whether LRU eviction is enforced
    pub enable_lru: bool,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Key prefix that scopes this cache inside shared storage
    pub namespace: String,
    /// Location of the file-backed persistent store
    pub storage_path: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum entries, 0 = unbounded (default: 100)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_ENABLE_LRU` - `true`/`false` (default: true)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `CACHE_NAMESPACE` - Key prefix (default: `respcache:`)
    /// - `CACHE_STORAGE_PATH` - Persistent store file (default: `respcache.json`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: match parse_env::<usize>("CACHE_MAX_ENTRIES") {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.max_entries,
            },
            default_ttl_ms: parse_env("CACHE_DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            enable_lru: parse_env("CACHE_ENABLE_LRU").unwrap_or(defaults.enable_lru),
            cleanup_interval: parse_env("CACHE_CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            storage_path: env::var("CACHE_STORAGE_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
        }
    }

    /// Policy derived from these settings.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.max_entries,
            default_ttl: Duration::from_millis(self.default_ttl_ms),
            enable_lru: self.enable_lru,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: Some(CacheConfig::DEFAULT_MAX_SIZE),
            default_ttl_ms: CacheConfig::DEFAULT_TTL_MS,
            enable_lru: true,
            cleanup_interval: 1,
            namespace: DEFAULT_NAMESPACE.to_string(),
            storage_path: PathBuf::from("respcache.json"),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
