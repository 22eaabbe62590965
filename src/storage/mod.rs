//! Storage Module
//!
//! String-keyed, string-valued host stores that the persistent cache layers
//! its TTL and LRU policy on top of.
//!
//! # Backends
//! - [`MemoryStorage`]: lives as long as the process (session scope)
//! - [`FileStorage`]: JSON file on disk (local scope)

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CacheError, Result};

// == Key Value Storage ==
/// An external string key/value store with capacity unknown to the cache.
///
/// Implementations provide their own interior mutability; the cache never
/// holds references into them.
pub trait KeyValueStorage: Send + Sync {
    /// Reads one item, `None` if absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Writes one item, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes one item; absent keys are not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Enumerates every key, including ones this cache does not own.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Byte footprint of one stored item.
fn item_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Rejects a write that would push `items` past `quota` bytes.
fn check_quota(
    items: &HashMap<String, String>,
    quota: Option<usize>,
    key: &str,
    value: &str,
) -> Result<()> {
    let Some(limit) = quota else {
        return Ok(());
    };
    let current: usize = items.iter().map(|(k, v)| item_size(k, v)).sum();
    let replaced = items.get(key).map_or(0, |old| item_size(key, old));
    let requested = current - replaced + item_size(key, value);
    if requested > limit {
        return Err(CacheError::QuotaExceeded { requested, limit });
    }
    Ok(())
}
