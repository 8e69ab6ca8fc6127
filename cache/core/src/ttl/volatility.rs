//! Per-key change-rate estimation.
//!
//! Tracks the timestamps of recent value changes and converts the mean
//! inter-arrival gap into a changes-per-hour rate. Keys with fewer than two
//! observations report a moderate default.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::config::VOLATILITY_MAX_HISTORY;
use crate::time::wall_ms;

/// Volatility reported for keys without enough history.
pub const DEFAULT_VOLATILITY: f64 = 0.5;

/// Bounded change histories keyed by cache key.
pub struct VolatilityEstimator {
    histories: DashMap<String, VecDeque<u64>>,
    max_history: usize,
}

impl Default for VolatilityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl VolatilityEstimator {
    pub fn new() -> Self {
        Self {
            histories: DashMap::new(),
            max_history: VOLATILITY_MAX_HISTORY,
        }
    }

    /// Record that `key`'s value changed now.
    pub fn record_change(&self, key: &str) {
        let mut history = self.histories.entry(key.to_string()).or_default();
        history.push_back(wall_ms());
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Estimated changes per hour for `key`.
    ///
    /// `3_600_000 / max(1, mean_gap_ms)` over the recorded history;
    /// [`DEFAULT_VOLATILITY`] when fewer than two changes have been seen.
    pub fn volatility(&self, key: &str) -> f64 {
        let history = match self.histories.get(key) {
            Some(h) => h,
            None => return DEFAULT_VOLATILITY,
        };
        if history.len() < 2 {
            return DEFAULT_VOLATILITY;
        }

        let mut total_gap = 0u64;
        for pair in history.iter().zip(history.iter().skip(1)) {
            total_gap += pair.1.saturating_sub(*pair.0);
        }
        let mean_gap = total_gap / (history.len() as u64 - 1);

        3_600_000.0 / mean_gap.max(1) as f64
    }

    /// Number of keys with recorded history.
    pub fn tracked_keys(&self) -> usize {
        self.histories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unknown_key_default() {
        let estimator = VolatilityEstimator::new();
        assert_eq!(estimator.volatility("never-seen"), DEFAULT_VOLATILITY);
    }

    #[test]
    fn test_single_sample_default() {
        let estimator = VolatilityEstimator::new();
        estimator.record_change("k");
        assert_eq!(estimator.volatility("k"), DEFAULT_VOLATILITY);
    }

    #[test]
    fn test_rapid_changes_high_volatility() {
        let estimator = VolatilityEstimator::new();
        for _ in 0..5 {
            estimator.record_change("hot");
            std::thread::sleep(Duration::from_millis(5));
        }
        // Mean gap of ~5ms extrapolates to hundreds of thousands of
        // changes per hour.
        assert!(estimator.volatility("hot") > 10_000.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let estimator = VolatilityEstimator::new();
        for _ in 0..50 {
            estimator.record_change("k");
        }
        let history = estimator.histories.get("k").unwrap();
        assert!(history.len() <= VOLATILITY_MAX_HISTORY);
    }

    #[test]
    fn test_tracked_keys() {
        let estimator = VolatilityEstimator::new();
        estimator.record_change("a");
        estimator.record_change("b");
        assert_eq!(estimator.tracked_keys(), 2);
    }
}
