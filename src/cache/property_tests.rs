//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check that both store kinds follow the same expiry and
//! eviction rules.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{KeyNamespacer, PersistentStore, VolatileStore};
use crate::config::CacheConfig;
use crate::storage::MemoryStorage;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;

// == Strategies ==
/// Generates cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

/// Generates nested JSON values
fn json_value_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z ]{0,16}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generates distinct keys in insertion order
fn unique_keys_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(valid_key_strategy(), min..max).prop_map(|keys| {
        let mut seen = HashSet::new();
        keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
    })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn volatile(max_size: usize) -> VolatileStore<String> {
    VolatileStore::with_config(CacheConfig::default().with_max_size(max_size))
}

fn persistent() -> PersistentStore {
    PersistentStore::new(Arc::new(MemoryStorage::new()), KeyNamespacer::default())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, hit and miss counters match what the
    // caller observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let store = volatile(TEST_MAX_ENTRIES);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(key, value, None),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.counters.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.counters.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.size, store.len(), "Size mismatch");
    }

    // Storing then reading before expiry returns the same value, for both
    // store kinds.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in json_value_strategy()) {
        let memory: VolatileStore<serde_json::Value> = VolatileStore::new();
        memory.set(key.clone(), value.clone(), None);
        prop_assert_eq!(memory.get(&key), Some(value.clone()));

        let store = persistent();
        store.set(&key, &value, None, &CacheConfig::default());
        prop_assert_eq!(store.get::<serde_json::Value>(&key), Some(value));
    }

    // After a delete, a read reports absent.
    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in valid_value_strategy()) {
        let store = volatile(TEST_MAX_ENTRIES);

        store.set(key.clone(), value, None);
        prop_assert!(store.get(&key).is_some(), "Key should exist before delete");

        prop_assert!(store.delete(&key));
        prop_assert!(store.get(&key).is_none(), "Key should not exist after delete");
    }

    // Writing V1 then V2 under one key leaves exactly one entry holding V2.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let store = volatile(TEST_MAX_ENTRIES);

        store.set(key.clone(), value1, None);
        store.set(key.clone(), value2.clone(), None);

        prop_assert_eq!(store.get(&key), Some(value2));
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrite");
    }

    // The store never holds more than max_size entries with LRU enabled.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), valid_value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let store = volatile(max_entries);

        for (key, value) in entries {
            store.set(key, value, None);
            prop_assert!(
                store.len() <= max_entries,
                "Cache size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // With LRU disabled nothing is ever evicted.
    #[test]
    fn prop_lru_disabled_never_evicts(keys in unique_keys_strategy(2, 30)) {
        let store: VolatileStore<String> = VolatileStore::with_config(
            CacheConfig::default().with_max_size(1).with_lru(false),
        );

        for key in &keys {
            store.set(key.clone(), key.clone(), None);
        }

        prop_assert_eq!(store.len(), keys.len());
    }

    // Filling to capacity and adding one more evicts exactly the first key,
    // on both store kinds.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in unique_keys_strategy(2, 10),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(initial_keys.len() >= 2);
        prop_assume!(!initial_keys.contains(&new_key));

        let capacity = initial_keys.len();
        let config = CacheConfig::default().with_max_size(capacity);
        let memory = volatile(capacity);
        let store = persistent();

        for key in &initial_keys {
            memory.set(key.clone(), key.clone(), None);
            store.set(key, key, None, &config);
        }
        memory.set(new_key.clone(), new_key.clone(), None);
        store.set(&new_key, &new_key, None, &config);

        let mut expected: Vec<String> = initial_keys[1..].to_vec();
        expected.push(new_key);
        expected.sort();

        prop_assert_eq!(memory.keys(), expected.clone());
        let persisted: Vec<String> = store
            .keys()
            .iter()
            .map(|k| store.namespacer().strip(k).to_string())
            .collect();
        prop_assert_eq!(persisted, expected);
    }

    // Reading the oldest key promotes it, so the second oldest is evicted.
    #[test]
    fn prop_lru_access_tracking(
        keys in unique_keys_strategy(3, 8),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(keys.len() >= 3);
        prop_assume!(!keys.contains(&new_key));

        let capacity = keys.len();
        let config = CacheConfig::default().with_max_size(capacity);
        let memory = volatile(capacity);
        let store = persistent();

        for key in &keys {
            memory.set(key.clone(), key.clone(), None);
            store.set(key, key, None, &config);
        }

        let accessed_key = &keys[0];
        let expected_evicted = &keys[1];
        memory.get(accessed_key);
        store.get::<String>(accessed_key);

        memory.set(new_key.clone(), new_key.clone(), None);
        store.set(&new_key, &new_key, None, &config);

        prop_assert!(memory.contains(accessed_key));
        prop_assert!(!memory.contains(expected_evicted));
        prop_assert!(memory.contains(&new_key));

        prop_assert!(store.contains(accessed_key));
        prop_assert!(!store.contains(expected_evicted));
        prop_assert!(store.contains(&new_key));
    }

    // Shrinking the policy evicts down to the new bound at once.
    #[test]
    fn prop_configure_shrinks(keys in unique_keys_strategy(1, 40), new_max in 0usize..20) {
        let store = volatile(TEST_MAX_ENTRIES);
        for key in &keys {
            store.set(key.clone(), key.clone(), None);
        }

        store.configure(CacheConfig::default().with_max_size(new_max));

        prop_assert_eq!(store.len(), keys.len().min(new_max));
    }
}

// == Concurrent Operation Correctness ==
// Shared handles used from many tasks keep the store within bounds and
// never hand out a value that was not written.

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_concurrent_operation_correctness(
        initial_entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..20
        ),
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let max_entries = 16;
            let store = volatile(max_entries);

            for (key, value) in &initial_entries {
                store.set(key.clone(), value.clone(), Some(Duration::from_secs(60)));
            }

            let mut written: HashSet<String> =
                initial_entries.iter().map(|(_, v)| v.clone()).collect();
            for op in &operations {
                if let CacheOp::Set { value, .. } = op {
                    written.insert(value.clone());
                }
            }
            let written = Arc::new(written);

            let mut handles = vec![];
            for op in operations {
                let store = store.clone();
                let written = Arc::clone(&written);

                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            store.set(key, value, None);
                            Ok::<_, String>(())
                        }
                        CacheOp::Get { key } => match store.get(&key) {
                            Some(value) if !written.contains(&value) => {
                                Err(format!("Got unknown value for key '{}'", key))
                            }
                            _ => Ok(()),
                        },
                        CacheOp::Delete { key } => {
                            store.delete(&key);
                            Ok(())
                        }
                    }
                }));
            }

            for handle in handles {
                let result = handle.await.expect("Task should not panic");
                prop_assert!(result.is_ok(), "Concurrent operation failed: {:?}", result);
            }

            let stats = store.stats();
            prop_assert!(stats.size <= max_entries, "Cache should not exceed max entries");
            let hit_rate = stats.hit_rate();
            prop_assert!((0.0..=1.0).contains(&hit_rate), "Hit rate out of range: {}", hit_rate);

            Ok(())
        })?;
    }
}

// Separate block with few cases for time-sensitive TTL properties
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After the TTL elapses, a read reports absent on both store kinds.
    #[test]
    fn prop_ttl_expiration_behavior(key in valid_key_strategy(), value in valid_value_strategy()) {
        let ttl = Some(Duration::from_millis(40));
        let memory = volatile(TEST_MAX_ENTRIES);
        let store = persistent();

        memory.set(key.clone(), value.clone(), ttl);
        store.set(&key, &value, ttl, &CacheConfig::default());
        prop_assert_eq!(memory.get(&key), Some(value.clone()));
        prop_assert_eq!(store.get::<String>(&key), Some(value));

        std::thread::sleep(Duration::from_millis(80));

        prop_assert!(memory.get(&key).is_none(), "Entry should not be found after TTL expires");
        prop_assert!(store.get::<String>(&key).is_none());
        prop_assert!(memory.is_empty());
        prop_assert!(store.is_empty());
    }
}
