//! End-to-end prefetcher behavior on a repeating access pattern,
//! driven the way the command dispatcher drives it: every read is
//! recorded, hits are reported for accuracy scoring, and misses are
//! filled from the backend.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chronos_cache::{DataLoader, PolicyKind, PrefetchConfig, Prefetcher, Store, StoreConfig};

fn test_store() -> Arc<Store> {
    Arc::new(Store::new(&StoreConfig {
        segments: 16,
        max_memory_bytes: 1 << 20,
        eviction_policy: PolicyKind::Lru,
    }))
}

/// Simulate one dispatcher read: record the access, score hits, and fill
/// misses from the backend like a read-through client would.
fn drive_read(store: &Store, prefetcher: &Prefetcher, loader: &Arc<dyn DataLoader>, key: &str) {
    match store.get(key) {
        Some(_) => prefetcher.on_read_hit(key),
        None => {
            if let Some(value) = loader.load(key) {
                store.put(key.to_string(), value, 0);
            }
        }
    }
    prefetcher.record_access(key);
}

#[test]
fn test_sequence_learning_fills_successors() {
    let store = test_store();
    let loader: Arc<dyn DataLoader> = Arc::new(|_: &str| Some(Bytes::from_static(b"x")));
    let prefetcher = Prefetcher::new(
        store.clone(),
        loader.clone(),
        PrefetchConfig {
            // Window-wide training spreads row mass across co-occurring
            // keys, so the cyclic pattern peaks near 0.4 per target.
            confidence: 0.25,
            top_n: 3,
            workers: 2,
            ..PrefetchConfig::default()
        },
    );

    // Train: fifty passes over the sequence, flushing between iterations
    // so every round exercises the dispatch path.
    for _ in 0..50 {
        for key in ["A", "B", "C"] {
            drive_read(&store, &prefetcher, &loader, key);
            std::thread::sleep(Duration::from_millis(2));
        }
        store.clear();
    }

    // Verify: a single access to A pulls its successors into the cache.
    store.clear();
    drive_read(&store, &prefetcher, &loader, "A");
    std::thread::sleep(Duration::from_millis(100));

    assert!(store.contains("B"), "B should have been prefetched");
    assert!(store.contains("C"), "C should have been prefetched");

    assert!(prefetcher.predictions_made() > 0);
    assert!(
        prefetcher.accuracy() > 0.5,
        "accuracy {} should exceed 0.5 after training",
        prefetcher.accuracy()
    );
    prefetcher.shutdown();
}

#[test]
fn test_random_traffic_learns_nothing_confident() {
    let store = test_store();
    let loader: Arc<dyn DataLoader> = Arc::new(|_: &str| Some(Bytes::from_static(b"x")));
    let prefetcher = Prefetcher::new(
        store.clone(),
        loader.clone(),
        PrefetchConfig {
            confidence: 0.6,
            workers: 2,
            ..PrefetchConfig::default()
        },
    );

    // A wide key space with no repeating structure: no transition ever
    // clears the production confidence threshold.
    let mut state: u64 = 0x9e3779b97f4a7c15;
    for _ in 0..200 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let key = format!("key{}", state % 50);
        drive_read(&store, &prefetcher, &loader, &key);
    }
    std::thread::sleep(Duration::from_millis(50));

    assert!(
        prefetcher.accuracy() < 0.5,
        "random traffic should not look predictable"
    );
    prefetcher.shutdown();
}
