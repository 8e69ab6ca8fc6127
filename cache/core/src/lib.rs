//! chronos-cache: the concurrency-and-intelligence engine behind the
//! chronos cache server.
//!
//! Building blocks, leaves first:
//!
//! - **Entry**: value plus expiration and access metadata
//! - **Eviction**: LRU/LFU victim selection over a segment table
//! - **Segment**: one lock-striped partition with a memory budget
//! - **Store**: the power-of-two segment array with fan-out operations
//! - **Prefetch**: first-order transition learning and background loads
//! - **TTL**: cost-benefit lifetime rewriting with volatility estimation
//! - **Snapshot**: framed, compressed, atomically swapped persistence
//! - **Metrics / Health**: latency histogram, counter snapshots, scoring
//! - **Scheduler / Pool**: named background timers and loader workers
//!
//! ```text
//!    dispatcher ──> Store ──> Segment (RwLock table + budget + counters)
//!        │
//!        ├──> Prefetcher ──> WorkerPool ──> DataLoader ──> Store
//!        └──> TtlController.observe_put
//!
//!    timers: sweep │ ttl rewrite │ snapshot │ health
//! ```

mod config;
mod entry;
mod error;
mod eviction;
mod health;
mod loader;
mod metrics;
mod pool;
mod prefetch;
mod scheduler;
mod segment;
mod snapshot;
mod store;
mod time;
mod ttl;
mod warming;

pub use config::{
    ENTRY_OVERHEAD, HealthConfig, MAX_KEY_LEN, MAX_VALUE_LEN, PolicyKind, PrefetchConfig,
    SWEEP_INTERVAL_SECS, SnapshotConfig, StoreConfig, TRANSITION_ROW_CAP, TtlConfig,
    VOLATILITY_MAX_HISTORY,
};
pub use entry::Entry;
pub use error::{CacheError, CacheResult};
pub use eviction::{EvictionPolicy, Lfu, Lru, create_policy};
pub use health::{HealthIssue, HealthMonitor, HealthReport, Severity};
pub use loader::{DataLoader, NoopLoader};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use pool::WorkerPool;
pub use prefetch::{Prediction, Prefetcher, TransitionRow};
pub use scheduler::Scheduler;
pub use segment::{EntryStats, PutOutcome, Segment};
pub use snapshot::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SnapshotManager};
pub use store::{CacheStats, Store};
pub use ttl::{DEFAULT_VOLATILITY, TtlController, VolatilityEstimator};
pub use warming::{CacheWarmer, WarmingRecommendation, WarmingResult};
