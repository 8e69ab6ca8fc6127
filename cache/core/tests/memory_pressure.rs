//! Memory pressure behavior under LRU on a single segment.

use bytes::Bytes;
use chronos_cache::{ENTRY_OVERHEAD, PolicyKind, Store, StoreConfig};
use std::time::Duration;

#[test]
fn test_lru_eviction_under_tight_budget() {
    // One segment with a 2000-byte budget; 300-byte values occupy
    // ENTRY_OVERHEAD + 300 = 420 bytes each, so only four entries fit.
    assert_eq!(ENTRY_OVERHEAD, 120);
    let store = Store::new(&StoreConfig {
        segments: 1,
        max_memory_bytes: 2000,
        eviction_policy: PolicyKind::Lru,
    });

    for i in 0..10 {
        store.put(format!("k{}", i), Bytes::from(vec![b'x'; 300]), 0);
        // Strictly increasing recency makes LRU victim selection
        // deterministic.
        std::thread::sleep(Duration::from_millis(2));
    }

    let stats = store.stats();
    assert!(
        stats.memory_bytes <= 2000,
        "memory {} exceeds budget",
        stats.memory_bytes
    );
    assert_eq!(stats.entry_count, 4);
    assert_eq!(stats.evictions, 6);
    assert_eq!(stats.memory_bytes, 4 * 420);

    // The oldest inserts were evicted in order; the newest suffix survives.
    for i in 0..6 {
        assert!(!store.contains(&format!("k{}", i)), "k{} should be gone", i);
    }
    for i in 6..10 {
        assert!(store.contains(&format!("k{}", i)), "k{} should remain", i);
    }
}

#[test]
fn test_replacement_never_double_counts() {
    let store = Store::new(&StoreConfig {
        segments: 1,
        max_memory_bytes: 10_000,
        eviction_policy: PolicyKind::Lru,
    });

    // Repeatedly replacing one key must keep usage at a single entry's
    // footprint; the naive accounting form would grow it every time.
    for round in 0..50 {
        store.put("k".to_string(), Bytes::from(vec![b'x'; 100 + round]), 0);
    }
    let stats = store.stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.memory_bytes, ENTRY_OVERHEAD + 149);
}

#[test]
fn test_lfu_keeps_frequent_keys() {
    let store = Store::new(&StoreConfig {
        segments: 1,
        max_memory_bytes: 2000,
        eviction_policy: PolicyKind::Lfu,
    });

    store.put("hot".to_string(), Bytes::from(vec![b'x'; 300]), 0);
    for _ in 0..50 {
        store.get("hot");
    }
    for i in 0..8 {
        store.put(format!("cold{}", i), Bytes::from(vec![b'x'; 300]), 0);
        std::thread::sleep(Duration::from_millis(2));
    }

    // The frequently-read key survives the churn of zero-count inserts.
    assert!(store.contains("hot"));
    assert!(store.stats().memory_bytes <= 2000);
}
