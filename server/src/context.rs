//! Shared handles the command dispatcher and admin endpoints operate on.

use std::sync::Arc;
use std::time::Instant;

use chronos_cache::{CacheWarmer, HealthMonitor, MetricsCollector, Prefetcher, Store, TtlController};

/// Everything a request handler needs, assembled once at startup.
pub struct AppContext {
    pub store: Arc<Store>,
    pub metrics: Arc<MetricsCollector>,
    pub health: Arc<HealthMonitor>,
    /// Present when `[prefetch] enabled = true`.
    pub prefetcher: Option<Arc<Prefetcher>>,
    /// Present when `[ttl] enabled = true`.
    pub ttl: Option<Arc<TtlController>>,
    pub warmer: Option<Arc<CacheWarmer>>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
