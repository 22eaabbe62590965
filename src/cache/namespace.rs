//! Key Namespacing
//!
//! Builds prefixed cache keys so this cache's entries can be told apart
//! from unrelated data sharing the same external store.

use sha2::{Digest, Sha256};

/// Default prefix for every key this cache writes.
pub const DEFAULT_NAMESPACE: &str = "respcache:";

const RESOURCE_TAG: &str = "res:";
const OVERRIDE_TAG: &str = "key:";

/// Builds and recognizes keys under a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespacer {
    prefix: String,
}

impl KeyNamespacer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the cache key for a resource.
    ///
    /// A caller-supplied override wins over the resource id. Overrides and
    /// resource ids are tagged differently so the two spaces never collide.
    pub fn build_key(&self, resource_id: &str, override_key: Option<&str>) -> String {
        match override_key {
            Some(key) => format!("{}{}{}", self.prefix, OVERRIDE_TAG, key),
            None => format!("{}{}{}", self.prefix, RESOURCE_TAG, resource_id),
        }
    }

    /// True if `key` belongs to this namespace.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Returns `key` under this namespace, prefixing it only if needed.
    pub fn qualify(&self, key: &str) -> String {
        if self.owns(key) {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Drops the namespace prefix, if present.
    pub fn strip<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
    }

    /// Filters an enumeration of a shared store down to this namespace.
    pub fn owned_keys<I>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        keys.into_iter().filter(|k| self.owns(k)).collect()
    }
}

impl Default for KeyNamespacer {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// Deterministic resource id from its parts: SHA-256 of the parts.
///
/// Uses length-prefixed encoding so `["a|b"]` and `["a", "|b"]` differ.
pub fn fingerprint<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}
