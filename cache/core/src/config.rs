//! Engine configuration.
//!
//! One immutable aggregate passed to the constructors of every component.
//! The server crate maps its TOML file onto these types; nothing in here
//! reads the environment or holds process-wide state.

use std::path::PathBuf;

/// Fixed per-entry bookkeeping overhead in bytes.
///
/// Models the headers and metadata an entry carries beyond its value, so
/// `size_bytes = ENTRY_OVERHEAD + value.len()`. Memory accounting tests
/// assert against this constant.
pub const ENTRY_OVERHEAD: u64 = 120;

/// Maximum accepted key length in bytes.
pub const MAX_KEY_LEN: usize = 1024;

/// Maximum accepted value length in bytes (10 MiB).
pub const MAX_VALUE_LEN: usize = 10 * 1024 * 1024;

/// Interval between expired-entry sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Fan-out cap for a single transition row. Once a row tracks this many
/// targets, accesses to unseen targets no longer widen it.
pub const TRANSITION_ROW_CAP: usize = 100;

/// Bounded change-history length per key in the volatility estimator.
pub const VOLATILITY_MAX_HISTORY: usize = 10;

/// Store configuration: striping, budget, and eviction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Requested segment count; rounded up to the next power of two.
    pub segments: usize,
    /// Total memory budget, split uniformly across segments.
    pub max_memory_bytes: u64,
    /// Victim selection strategy.
    pub eviction_policy: PolicyKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            segments: 256,
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
            eviction_policy: PolicyKind::Lru,
        }
    }
}

/// Eviction policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Least recently used.
    #[default]
    Lru,
    /// Least frequently used, ties broken by recency.
    Lfu,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(PolicyKind::Lru),
            "lfu" => Ok(PolicyKind::Lfu),
            _ => Err(format!(
                "unknown eviction policy: '{}' (expected 'lru' or 'lfu')",
                s
            )),
        }
    }
}

/// Predictive prefetcher configuration.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    pub enabled: bool,
    /// Minimum transition probability before a target is prefetched.
    pub confidence: f64,
    /// Access-history window size. Zero disables prediction entirely.
    pub window: usize,
    /// Number of top-ranked targets dispatched per access.
    pub top_n: usize,
    /// Fixed worker pool size for background loads.
    pub workers: usize,
    /// How long a prediction may sit unconsumed before it no longer counts.
    pub expiry_ms: u64,
    /// TTL applied to entries filled by the prefetcher.
    pub fill_ttl_s: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence: 0.6,
            window: 10,
            top_n: 3,
            workers: 4,
            expiry_ms: 30_000,
            fill_ttl_s: 3600,
        }
    }
}

/// Adaptive TTL controller configuration.
#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub enabled: bool,
    /// Seconds between rewrite passes.
    pub interval_s: u64,
    /// Base TTL the multiplier scales.
    pub base_s: u64,
    pub min_mult: f64,
    pub max_mult: f64,
    /// Relative change below which an entry's TTL is left alone.
    pub deadband: f64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: 300,
            base_s: 3600,
            min_mult: 0.1,
            max_mult: 10.0,
            deadband: 0.2,
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub interval_s: u64,
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: 300,
            path: PathBuf::from("./data/chronos.snapshot"),
        }
    }
}

/// Health scoring configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub interval_s: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval_s: 30 }
    }
}
