//! Response cache facade.
//!
//! One explicitly constructed instance per process, passed by handle to
//! whoever needs it. Each call names its backend; the matching store
//! enforces expiry and capacity on its own.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::Backend;
use crate::cache::{
    ttl_from_millis, CacheInspection, CacheStats, KeyNamespacer, PersistentStore, VolatileStore,
};
use crate::config::{CacheConfig, ConfigOverrides};
use crate::storage::KeyValueStorage;
use crate::tasks::spawn_cleanup_task;

// == Response Cache ==
/// Uniform get/set/delete/clear surface over every backend.
pub struct ResponseCache<V> {
    namespacer: KeyNamespacer,
    memory: VolatileStore<V>,
    local: PersistentStore,
    session: PersistentStore,
    /// Policy for persistent writes that do not pass their own
    defaults: CacheConfig,
}

/// Attaches host storages and a namespace before building a [`ResponseCache`].
pub struct ResponseCacheBuilder<V> {
    config: CacheConfig,
    namespace: Option<String>,
    local: Option<Box<dyn KeyValueStorage>>,
    session: Option<Box<dyn KeyValueStorage>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> Default for ResponseCacheBuilder<V> {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            namespace: None,
            local: None,
            session: None,
            _value: PhantomData,
        }
    }
}

impl<V> ResponseCacheBuilder<V>
where
    V: Clone + Send + Serialize + DeserializeOwned + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>) -> Self {
        self.namespace = Some(prefix.into());
        self
    }

    pub fn local_storage(mut self, storage: impl KeyValueStorage + 'static) -> Self {
        self.local = Some(Box::new(storage));
        self
    }

    pub fn session_storage(mut self, storage: impl KeyValueStorage + 'static) -> Self {
        self.session = Some(Box::new(storage));
        self
    }

    pub fn build(self) -> ResponseCache<V> {
        let namespacer = self
            .namespace
            .map(KeyNamespacer::new)
            .unwrap_or_default();
        debug!(
            namespace = namespacer.prefix(),
            local = self.local.is_some(),
            session = self.session.is_some(),
            "Building response cache"
        );
        ResponseCache {
            memory: VolatileStore::with_config(self.config.clone()),
            local: PersistentStore::from_storage(self.local, namespacer.clone()),
            session: PersistentStore::from_storage(self.session, namespacer.clone()),
            namespacer,
            defaults: self.config,
        }
    }
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Serialize + DeserializeOwned + 'static,
{
    /// Creates a cache with only the volatile backend available.
    pub fn new(config: CacheConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Starts a builder whose value type is this cache's `V`.
    pub fn builder() -> ResponseCacheBuilder<V> {
        ResponseCacheBuilder::new()
    }

    // == Build Key ==
    /// Namespaced key for a resource, or for the caller's override key.
    pub fn build_key(&self, resource_id: &str, override_key: Option<&str>) -> String {
        self.namespacer.build_key(resource_id, override_key)
    }

    // == Read ==
    pub fn read(&self, key: &str, backend: Backend) -> Option<V> {
        match backend {
            Backend::Memory => self.memory.get(key),
            Backend::Local | Backend::Session => self.persistent(backend).get(key),
        }
    }

    // == Write ==
    /// Stores `value` with a TTL in milliseconds (default TTL if `None`).
    ///
    /// A TTL of zero or less makes the entry unreadable immediately.
    /// `config` applies to persistent backends only; the volatile store
    /// keeps the policy set through [`configure_capacity`](Self::configure_capacity).
    pub fn write(
        &self,
        key: &str,
        value: V,
        ttl_ms: Option<i64>,
        backend: Backend,
        config: Option<&CacheConfig>,
    ) {
        let ttl = ttl_ms.map(ttl_from_millis);
        match backend {
            Backend::Memory => self.memory.set(key, value, ttl),
            Backend::Local | Backend::Session => {
                let config = config.unwrap_or(&self.defaults);
                self.persistent(backend).set(key, &value, ttl, config);
            }
        }
    }

    // == Invalidate ==
    /// Removes one key. Returns true if something was removed.
    pub fn invalidate(&self, key: &str, backend: Backend) -> bool {
        match backend {
            Backend::Memory => self.memory.delete(key),
            Backend::Local | Backend::Session => self.persistent(backend).delete(key),
        }
    }

    /// Removes every entry this cache owns on `backend`.
    pub fn invalidate_all(&self, backend: Backend) {
        match backend {
            Backend::Memory => self.memory.clear(),
            Backend::Local | Backend::Session => {
                let removed = self.persistent(backend).clear();
                debug!(%backend, removed, "Cleared persistent cache namespace");
            }
        }
    }

    // == Inspect ==
    pub fn inspect(&self, backend: Backend) -> CacheInspection {
        self.stats(backend).inspection()
    }

    /// Full statistics for `backend`. Persistent stats report the default policy.
    pub fn stats(&self, backend: Backend) -> CacheStats {
        match backend {
            Backend::Memory => self.memory.stats(),
            Backend::Local | Backend::Session => self.persistent(backend).stats(&self.defaults),
        }
    }

    // == Configure Capacity ==
    /// Updates the volatile store's policy, evicting at once if now over capacity.
    ///
    /// Returns the number of entries evicted.
    pub fn configure_capacity(&self, overrides: &ConfigOverrides) -> usize {
        self.memory.apply(overrides)
    }

    /// Removes expired entries from `backend` eagerly.
    pub fn purge_expired(&self, backend: Backend) -> usize {
        match backend {
            Backend::Memory => self.memory.cleanup(),
            Backend::Local | Backend::Session => self.persistent(backend).purge_expired(),
        }
    }

    /// Periodically sweeps the volatile store. Must be called inside a Tokio runtime.
    pub fn spawn_cleanup_task(&self, interval: Duration) -> JoinHandle<()> {
        spawn_cleanup_task(self.memory.clone(), interval)
    }

    /// True if `key` holds a live entry on `backend`. Does not promote it.
    pub fn contains(&self, key: &str, backend: Backend) -> bool {
        match backend {
            Backend::Memory => self.memory.contains(key),
            Backend::Local | Backend::Session => self.persistent(backend).contains(key),
        }
    }

    pub fn is_available(&self, backend: Backend) -> bool {
        match backend {
            Backend::Memory => true,
            Backend::Local | Backend::Session => self.persistent(backend).is_available(),
        }
    }

    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    pub fn memory(&self) -> &VolatileStore<V> {
        &self.memory
    }

    fn persistent(&self, backend: Backend) -> &PersistentStore {
        match backend {
            Backend::Session => &self.session,
            _ => &self.local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::{json, Value};

    fn full_cache(config: CacheConfig) -> ResponseCache<Value> {
        ResponseCache::builder()
            .config(config)
            .local_storage(MemoryStorage::new())
            .session_storage(MemoryStorage::new())
            .build()
    }

    #[test]
    fn test_write_read_every_backend() {
        let cache = full_cache(CacheConfig::default());
        let key = cache.build_key("GET /users", None);

        for backend in Backend::ALL {
            cache.write(&key, json!({"backend": backend.as_str()}), None, backend, None);
        }

        for backend in Backend::ALL {
            assert_eq!(
                cache.read(&key, backend),
                Some(json!({"backend": backend.as_str()}))
            );
        }
    }

    #[test]
    fn test_backends_are_independent() {
        let cache = full_cache(CacheConfig::default());
        let key = cache.build_key("r", None);

        cache.write(&key, json!(1), None, Backend::Local, None);

        assert_eq!(cache.read(&key, Backend::Memory), None);
        assert_eq!(cache.read(&key, Backend::Session), None);
        assert!(cache.invalidate(&key, Backend::Local));
        assert_eq!(cache.read(&key, Backend::Local), None);
    }

    #[test]
    fn test_negative_ttl_unreadable() {
        let cache = full_cache(CacheConfig::default());

        for backend in Backend::ALL {
            cache.write("k", json!("v"), Some(-1), backend, None);
            assert_eq!(cache.read("k", backend), None);
        }
    }

    #[test]
    fn test_per_call_config_for_persistent() {
        let cache = full_cache(CacheConfig::unbounded());
        let tight = CacheConfig::default().with_max_size(1);

        cache.write("a", json!(1), None, Backend::Session, Some(&tight));
        cache.write("b", json!(2), None, Backend::Session, Some(&tight));

        assert_eq!(cache.inspect(Backend::Session).size, 1);
        assert_eq!(cache.read("b", Backend::Session), Some(json!(2)));
    }

    #[test]
    fn test_configure_capacity_only_touches_memory() {
        let cache = full_cache(CacheConfig::unbounded());
        for key in ["a", "b", "c"] {
            cache.write(key, json!(key), None, Backend::Memory, None);
            cache.write(key, json!(key), None, Backend::Local, None);
        }

        assert_eq!(cache.configure_capacity(&ConfigOverrides::max_size(1)), 2);

        assert_eq!(cache.inspect(Backend::Memory).size, 1);
        assert_eq!(cache.inspect(Backend::Local).size, 3);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = full_cache(CacheConfig::default());
        for backend in Backend::ALL {
            cache.write("a", json!(1), None, backend, None);
            cache.invalidate_all(backend);
            assert_eq!(cache.inspect(backend), CacheInspection::default());
        }
    }

    #[test]
    fn test_missing_host_storage() {
        let cache: ResponseCache<Value> = ResponseCache::new(CacheConfig::default());

        assert!(cache.is_available(Backend::Memory));
        assert!(!cache.is_available(Backend::Local));

        cache.write("a", json!(1), None, Backend::Local, None);
        assert_eq!(cache.read("a", Backend::Local), None);
        assert!(!cache.invalidate("a", Backend::Local));
        cache.invalidate_all(Backend::Session);
        assert_eq!(cache.inspect(Backend::Session).size, 0);
    }

    #[test]
    fn test_builder_infers_value_type_from_binding() {
        let cache: ResponseCache<Vec<u32>> = ResponseCache::builder()
            .session_storage(MemoryStorage::new())
            .build();
        cache.write("ids", vec![1, 2], None, Backend::Session, None);
        assert_eq!(cache.read("ids", Backend::Session), Some(vec![1, 2]));

        let typed = ResponseCacheBuilder::<String>::new().build();
        typed.write("k", "v".to_string(), None, Backend::Memory, None);
        assert_eq!(typed.read("k", Backend::Memory), Some("v".to_string()));
    }

    #[test]
    fn test_custom_namespace() {
        let cache: ResponseCache<Value> = ResponseCache::builder().namespace("svc:").build();
        assert_eq!(cache.build_key("x", None), "svc:res:x");
        assert_eq!(cache.build_key("x", Some("mine")), "svc:key:mine");
    }
}
