//! First-order transition counts for one source key.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// A predicted next key with its observed transition probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub key: String,
    pub probability: f64,
}

/// Concurrent distribution row: counts of observed `from → target`
/// transitions plus their running total.
///
/// Rows cap their fan-out: once `cap` distinct targets exist, transitions to
/// unseen targets are dropped while known targets keep counting. This bounds
/// matrix memory without a global sweep.
pub struct TransitionRow {
    counts: DashMap<String, u64>,
    total: AtomicU64,
    cap: usize,
}

impl TransitionRow {
    pub fn new(cap: usize) -> Self {
        Self {
            counts: DashMap::new(),
            total: AtomicU64::new(0),
            cap,
        }
    }

    /// Record one observed transition to `target`.
    pub fn increment(&self, target: &str) {
        if self.counts.len() >= self.cap && !self.counts.contains_key(target) {
            return;
        }
        *self.counts.entry(target.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Observed probability of transitioning to `target`.
    pub fn probability(&self, target: &str) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let count = self.counts.get(target).map(|c| *c).unwrap_or(0);
        count as f64 / total as f64
    }

    /// The up-to-`n` most probable targets at or above `threshold`,
    /// ranked by probability descending.
    pub fn top_predictions(&self, n: usize, threshold: f64) -> Vec<Prediction> {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return Vec::new();
        }

        let mut predictions: Vec<Prediction> = self
            .counts
            .iter()
            .map(|item| Prediction {
                key: item.key().clone(),
                probability: *item.value() as f64 / total as f64,
            })
            .filter(|p| p.probability >= threshold)
            .collect();

        predictions.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions.truncate(n);
        predictions
    }

    /// Number of distinct targets tracked.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
