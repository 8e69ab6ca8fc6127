//! Cold-start cache warming.
//!
//! Tracks which keys are requested in the first minutes after startup,
//! ranks them by expected value, and reloads the best candidates through
//! the backend loader so a restarted node does not serve a cold cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::loader::DataLoader;
use crate::pool::WorkerPool;
use crate::store::Store;
use crate::time::wall_ms;

/// Accesses are tracked for this long after startup.
const COLD_START_WINDOW_MS: u64 = 300_000;

/// Per-load timeout while warming.
const WARM_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A candidate key for warming, ranked by `frequency × cost / size`:
/// frequent, expensive-to-rebuild, small keys warm first.
#[derive(Debug, Clone)]
pub struct WarmingRecommendation {
    pub key: String,
    pub access_frequency: u64,
    pub compute_cost_ms: u64,
    pub size_bytes: u64,
    pub priority: f64,
}

impl WarmingRecommendation {
    fn new(key: String, access_frequency: u64, compute_cost_ms: u64, size_bytes: u64) -> Self {
        let priority =
            access_frequency as f64 * compute_cost_ms.max(1) as f64 / size_bytes.max(1) as f64;
        Self {
            key,
            access_frequency,
            compute_cost_ms,
            size_bytes,
            priority,
        }
    }
}

/// Outcome of a warming run.
#[derive(Debug, Clone, Copy)]
pub struct WarmingResult {
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Observes cold-start traffic and replays the most valuable keys.
pub struct CacheWarmer {
    store: Arc<Store>,
    loader: Arc<dyn DataLoader>,
    workers: usize,
    top_n: usize,
    cold_start: DashMap<String, u64>,
    started_at_ms: AtomicU64,
}

impl CacheWarmer {
    pub fn new(store: Arc<Store>, loader: Arc<dyn DataLoader>, workers: usize, top_n: usize) -> Self {
        Self {
            store,
            loader,
            workers,
            top_n,
            cold_start: DashMap::new(),
            started_at_ms: AtomicU64::new(wall_ms()),
        }
    }

    /// Record a key access; only counted inside the cold-start window.
    pub fn record_access(&self, key: &str) {
        let started = self.started_at_ms.load(Ordering::Relaxed);
        if wall_ms().saturating_sub(started) < COLD_START_WINDOW_MS {
            *self.cold_start.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    /// Rank the observed cold-start keys, best first, capped at `top_n`.
    pub fn recommendations(&self) -> Vec<WarmingRecommendation> {
        let mut recs: Vec<WarmingRecommendation> = self
            .cold_start
            .iter()
            .map(|item| {
                let key = item.key().clone();
                let frequency = *item.value();
                // Cost and size come from the live entry when one exists;
                // otherwise assume a modest 10ms / 1KiB candidate.
                let (cost, size) = match self.store.entry_stats(&key) {
                    Some(stats) => (stats.compute_cost_ms, stats.size_bytes),
                    None => (10, 1024),
                };
                WarmingRecommendation::new(key, frequency, cost, size)
            })
            .collect();

        recs.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recs.truncate(self.top_n);
        recs
    }

    /// Load the recommended keys through the backend.
    ///
    /// Keys already in the cache are skipped; a load that returns absent
    /// counts as failed. Blocks until every load finishes or times out.
    pub fn warm(&self) -> WarmingResult {
        let recommendations = self.recommendations();
        if recommendations.is_empty() {
            tracing::info!("no warming candidates, cache considered warm");
            return WarmingResult {
                succeeded: 0,
                failed: 0,
                duration_ms: 0,
            };
        }

        tracing::info!(candidates = recommendations.len(), "warming cache");
        let started = Instant::now();
        let pool = WorkerPool::new("chronos-warmer", self.workers);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<bool>();

        let submitted = recommendations.len();
        for rec in recommendations {
            let store = self.store.clone();
            let loader = self.loader.clone();
            let tx = result_tx.clone();
            pool.execute(move || {
                let outcome = if store.contains(&rec.key) {
                    false // already warm
                } else {
                    match loader.load(&rec.key) {
                        Some(value) => {
                            store.put(rec.key.clone(), value, 0);
                            tracing::debug!(key = %rec.key, "warmed");
                            true
                        }
                        None => false,
                    }
                };
                let _ = tx.send(outcome);
            });
        }
        drop(result_tx);

        let mut succeeded = 0;
        let mut failed = 0;
        for _ in 0..submitted {
            match result_rx.recv_timeout(WARM_LOAD_TIMEOUT) {
                Ok(true) => succeeded += 1,
                Ok(false) => failed += 1,
                Err(_) => failed += 1,
            }
        }
        pool.shutdown();

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(succeeded, failed, duration_ms, "cache warming complete");
        WarmingResult {
            succeeded,
            failed,
            duration_ms,
        }
    }

    /// Restart cold-start tracking (e.g., after a planned failover).
    pub fn reset(&self) {
        self.started_at_ms.store(wall_ms(), Ordering::Relaxed);
        self.cold_start.clear();
        tracing::info!("cold-start tracking reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyKind, StoreConfig};
    use bytes::Bytes;

    fn test_store() -> Arc<Store> {
        Arc::new(Store::new(&StoreConfig {
            segments: 4,
            max_memory_bytes: 1 << 20,
            eviction_policy: PolicyKind::Lru,
        }))
    }

    #[test]
    fn test_recommendations_ranked_by_priority() {
        let store = test_store();
        let loader: Arc<dyn DataLoader> = Arc::new(|_: &str| None);
        let warmer = CacheWarmer::new(store, loader, 2, 10);

        for _ in 0..10 {
            warmer.record_access("popular");
        }
        warmer.record_access("rare");

        let recs = warmer.recommendations();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].key, "popular");
        assert!(recs[0].priority > recs[1].priority);
    }

    #[test]
    fn test_top_n_caps_recommendations() {
        let store = test_store();
        let loader: Arc<dyn DataLoader> = Arc::new(|_: &str| None);
        let warmer = CacheWarmer::new(store, loader, 2, 3);
        for i in 0..10 {
            warmer.record_access(&format!("k{}", i));
        }
        assert_eq!(warmer.recommendations().len(), 3);
    }

    #[test]
    fn test_warm_loads_missing_keys() {
        let store = test_store();
        let loader: Arc<dyn DataLoader> = Arc::new(|key: &str| {
            if key == "gone" {
                None
            } else {
                Some(Bytes::from_static(b"restored"))
            }
        });
        let warmer = CacheWarmer::new(store.clone(), loader, 2, 10);

        warmer.record_access("a");
        warmer.record_access("gone");
        store.put("cached".to_string(), Bytes::from_static(b"v"), 0);
        warmer.record_access("cached");

        let result = warmer.warm();
        assert_eq!(result.succeeded, 1); // "a" loaded
        assert_eq!(result.failed, 2); // "gone" absent, "cached" skipped
        assert!(store.contains("a"));
    }

    #[test]
    fn test_warm_with_nothing_tracked() {
        let warmer = CacheWarmer::new(test_store(), Arc::new(crate::loader::NoopLoader), 2, 5);
        let result = warmer.warm();
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_reset_clears_tracking() {
        let warmer = CacheWarmer::new(test_store(), Arc::new(crate::loader::NoopLoader), 2, 5);
        warmer.record_access("k");
        warmer.reset();
        assert!(warmer.recommendations().is_empty());
    }
}
