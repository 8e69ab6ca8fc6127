//! Segmented store: a fixed array of lock-striped partitions.
//!
//! Keys are routed by hashing: an ahash value spread with its upper half and
//! masked with `segments - 1`. The spread step matters — masking unspread
//! hashes concentrated load on a few segments under testing.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::eviction::create_policy;
use crate::segment::{EntryStats, PutOutcome, Segment};

/// Fixed seeds keep key→segment routing stable across restarts, which keeps
/// snapshot restores from reshuffling segment occupancy.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Aggregated counters across every segment. Weakly consistent.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub memory_bytes: u64,
    pub entry_count: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit; 0.0 before any traffic.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The segmented cache store.
pub struct Store {
    segments: Vec<Segment>,
    mask: usize,
    hasher: ahash::RandomState,
}

impl Store {
    /// Build a store from configuration. The requested segment count is
    /// rounded up to the next power of two and the budget split uniformly.
    pub fn new(config: &StoreConfig) -> Self {
        let count = config.segments.max(1).next_power_of_two();
        let budget_per_segment = config.max_memory_bytes / count as u64;

        let segments = (0..count)
            .map(|_| Segment::new(create_policy(config.eviction_policy), budget_per_segment))
            .collect();

        tracing::info!(
            segments = count,
            memory_mb = config.max_memory_bytes / (1024 * 1024),
            policy = ?config.eviction_policy,
            "store initialized"
        );

        Self {
            segments,
            mask: count - 1,
            hasher: ahash::RandomState::with_seeds(
                HASH_SEEDS.0,
                HASH_SEEDS.1,
                HASH_SEEDS.2,
                HASH_SEEDS.3,
            ),
        }
    }

    /// Convenience constructor with defaults and an overridden budget.
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self::new(&StoreConfig::default()))
    }

    #[inline]
    fn segment_for(&self, key: &str) -> &Segment {
        let mut h = self.hasher.hash_one(key);
        // Fold the upper bits down before masking.
        h ^= h >> 32;
        &self.segments[(h as usize) & self.mask]
    }

    /// Look up a value, recording hit/miss on the owning segment.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.segment_for(key).get(key)
    }

    /// Insert or replace a value. `ttl_seconds == 0` means no expiration.
    pub fn put(&self, key: String, value: Bytes, ttl_seconds: u64) -> PutOutcome {
        let entry = Entry::new(value, ttl_seconds);
        self.segment_for(&key).put(key, entry)
    }

    /// Insert a prebuilt entry (used for cost-annotated fills).
    pub fn put_entry(&self, key: String, entry: Entry) -> PutOutcome {
        self.segment_for(&key).put(key, entry)
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.segment_for(key).delete(key)
    }

    /// Rewrite the TTL of a live key.
    pub fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        self.segment_for(key).set_ttl(key, ttl_seconds)
    }

    /// Remaining TTL in the Redis convention: seconds, `-1` for entries
    /// without a TTL, `-2` when the key is missing or expired.
    pub fn ttl(&self, key: &str) -> i64 {
        match self.segment_for(key).ttl(key) {
            Some(Some(seconds)) => seconds as i64,
            Some(None) => -1,
            None => -2,
        }
    }

    /// Presence probe without hit/miss accounting.
    pub fn contains(&self, key: &str) -> bool {
        self.segment_for(key).contains(key)
    }

    /// Metadata peek for the TTL controller.
    pub fn entry_stats(&self, key: &str) -> Option<EntryStats> {
        self.segment_for(key).entry_stats(key)
    }

    /// Every key across all segments. Weakly consistent.
    pub fn keys(&self) -> Vec<String> {
        let mut all = Vec::new();
        for segment in &self.segments {
            all.extend(segment.keys());
        }
        all
    }

    /// Drop everything.
    pub fn clear(&self) {
        for segment in &self.segments {
            segment.clear();
        }
        tracing::info!("cache cleared");
    }

    /// Aggregate counters across all segments.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for segment in &self.segments {
            stats.hits += segment.hits();
            stats.misses += segment.misses();
            stats.evictions += segment.evictions();
            stats.memory_bytes += segment.memory_used();
            stats.entry_count += segment.len();
        }
        stats
    }

    /// One sweep pass over every segment, removing expired entries.
    /// Holds at most one segment write lock at a time.
    pub fn sweep_expired(&self) -> usize {
        let mut cleaned = 0;
        for segment in &self.segments {
            cleaned += segment.sweep_expired();
        }
        if cleaned > 0 {
            tracing::debug!(cleaned, "removed expired entries");
        }
        cleaned
    }

    /// Live entries from every segment for the snapshot writer.
    /// Weakly consistent: entries written or deleted concurrently may or may
    /// not appear.
    pub fn snapshot_records(&self) -> Vec<(String, Bytes, Option<u64>)> {
        let mut records = Vec::new();
        for segment in &self.segments {
            records.extend(segment.snapshot_records());
        }
        records
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
