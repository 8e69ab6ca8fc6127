//! Operation metrics.
//!
//! Latency is recorded in microseconds into a `metriken::AtomicHistogram`
//! with grouping power 10, keeping relative error under 0.1% across the
//! full range. Counter data comes from the store's segment counters; a
//! snapshot bundles both for the health scorer and the admin endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metriken::AtomicHistogram;
use metriken::histogram::Histogram;

use crate::store::Store;

/// Collects per-operation latency and exposes counter snapshots.
pub struct MetricsCollector {
    store: Arc<Store>,
    latency: AtomicHistogram,
    total_operations: AtomicU64,
}

/// Point-in-time view of every exported metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub memory_bytes: u64,
    pub entry_count: usize,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub total_operations: u64,
}

impl MetricsCollector {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            latency: AtomicHistogram::new(10, 64),
            total_operations: AtomicU64::new(0),
        }
    }

    /// Record one completed operation.
    #[inline]
    pub fn record_operation(&self, elapsed: Duration) {
        let _ = self.latency.increment(elapsed.as_micros() as u64);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot counters and latency percentiles.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let stats = self.store.stats();
        let (p50, p95, p99) = match self.latency.load() {
            Some(histogram) => (
                percentile_ms(&histogram, 50.0),
                percentile_ms(&histogram, 95.0),
                percentile_ms(&histogram, 99.0),
            ),
            None => (0.0, 0.0, 0.0),
        };

        MetricsSnapshot {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            evictions: stats.evictions,
            memory_bytes: stats.memory_bytes,
            entry_count: stats.entry_count,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            p99_latency_ms: p99,
            total_operations: self.total_operations.load(Ordering::Relaxed),
        }
    }

    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }
}

/// Upper bound of the bucket holding percentile `p`, in milliseconds.
fn percentile_ms(histogram: &Histogram, p: f64) -> f64 {
    if let Ok(Some(results)) = histogram.percentiles(&[p]) {
        if let Some((_pct, bucket)) = results.first() {
            return bucket.end() as f64 / 1000.0;
        }
    }
    0.0
}
