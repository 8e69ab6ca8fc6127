//! Adaptive TTL controller.
//!
//! Periodically recomputes a target lifetime for every live entry from its
//! observed access rate, size, change volatility, and reconstruction cost,
//! and rewrites the entry's expiration when the target differs enough from
//! the current remaining TTL.

mod volatility;

pub use volatility::{DEFAULT_VOLATILITY, VolatilityEstimator};

use std::sync::Arc;

use crate::config::TtlConfig;
use crate::segment::{EntryStats, PutOutcome};
use crate::store::Store;

/// Cost-benefit TTL controller.
pub struct TtlController {
    store: Arc<Store>,
    estimator: VolatilityEstimator,
    config: TtlConfig,
}

impl TtlController {
    pub fn new(store: Arc<Store>, config: TtlConfig) -> Self {
        Self {
            store,
            estimator: VolatilityEstimator::new(),
            config,
        }
    }

    /// Feed from the dispatcher on every SET: a replacement whose value
    /// hash differs from the previous one counts as a change.
    pub fn observe_put(&self, key: &str, outcome: &PutOutcome) {
        if let Some(old_hash) = outcome.old_value_hash {
            if old_hash != outcome.new_value_hash {
                self.estimator.record_change(key);
            }
        }
    }

    /// Target TTL for a live entry.
    ///
    /// ```text
    /// benefit    = accesses_per_hour × max(1, compute_cost_ms)
    /// cost       = size_bytes × volatility        (≥ 1)
    /// multiplier = clamp(benefit / cost, min_mult, max_mult)
    /// target     = base_s × multiplier
    /// ```
    pub fn optimal_ttl(&self, key: &str, stats: &EntryStats) -> u64 {
        let benefit = stats.accesses_per_hour * stats.compute_cost_ms.max(1) as f64;
        let volatility = self.estimator.volatility(key);
        let cost = (stats.size_bytes as f64 * volatility.max(f64::EPSILON)).max(1.0);

        let multiplier = (benefit / cost).clamp(self.config.min_mult, self.config.max_mult);
        let target = self.config.base_s as f64 * multiplier;

        tracing::trace!(
            key,
            rate = stats.accesses_per_hour,
            size = stats.size_bytes,
            compute_cost_ms = stats.compute_cost_ms,
            volatility,
            target_s = target as u64,
            "ttl calculation"
        );

        target as u64
    }

    /// One rewrite pass over every key.
    ///
    /// Entries without a TTL keep their never-expires sentinel; rewriting
    /// them would silently convert permanent entries into expiring ones.
    /// Returns the number of entries whose TTL was rewritten.
    pub fn adjust_all(&self) -> usize {
        let mut adjusted = 0;

        for key in self.store.keys() {
            let stats = match self.store.entry_stats(&key) {
                Some(stats) => stats,
                None => continue, // deleted or expired since the key snapshot
            };
            let current = match stats.ttl_remaining {
                Some(seconds) => seconds,
                None => continue,
            };

            let target = self.optimal_ttl(&key, &stats);
            let delta = target.abs_diff(current) as f64;
            if delta > self.config.deadband * current as f64 {
                if self.store.expire(&key, target) {
                    adjusted += 1;
                    tracing::debug!(key = %key, from_s = current, to_s = target, "adjusted ttl");
                }
            }
        }

        if adjusted > 0 {
            tracing::info!(adjusted, "ttl rewrite pass complete");
        }
        adjusted
    }

    pub fn estimator(&self) -> &VolatilityEstimator {
        &self.estimator
    }
}
