//! Predictive prefetcher.
//!
//! Learns a first-order transition distribution over key accesses and loads
//! probable next keys through a [`DataLoader`](crate::loader::DataLoader)
//! before they are requested. Every completed read is reported via
//! [`Prefetcher::record_access`]; hits on keys the prefetcher predicted are
//! reported via [`Prefetcher::on_read_hit`] and feed the accuracy ratio.

mod transitions;

pub use transitions::{Prediction, TransitionRow};

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::{PrefetchConfig, TRANSITION_ROW_CAP};
use crate::loader::DataLoader;
use crate::pool::WorkerPool;
use crate::store::Store;
use crate::time::wall_ms;

/// Markov-chain prefetcher with a fixed background loader pool.
pub struct Prefetcher {
    store: Arc<Store>,
    loader: Arc<dyn DataLoader>,
    config: PrefetchConfig,
    transitions: DashMap<String, TransitionRow>,
    /// The last `window` accessed keys; every key in it is a context for the
    /// newest access. Guarded by its own mutex only.
    recent: Mutex<VecDeque<String>>,
    /// Key → wall-clock instant it was most recently predicted.
    predicted: DashMap<String, u64>,
    predictions_made: AtomicU64,
    predictions_hit: AtomicU64,
    /// Taken on shutdown so the pool can drain while other handles to the
    /// prefetcher still exist.
    pool: Mutex<Option<WorkerPool>>,
}

impl Prefetcher {
    pub fn new(store: Arc<Store>, loader: Arc<dyn DataLoader>, config: PrefetchConfig) -> Self {
        let pool = WorkerPool::new("chronos-prefetch", config.workers);
        tracing::info!(
            window = config.window,
            confidence = config.confidence,
            workers = config.workers,
            "predictive prefetcher initialized"
        );
        Self {
            store,
            loader,
            config,
            transitions: DashMap::new(),
            recent: Mutex::new(VecDeque::new()),
            predicted: DashMap::new(),
            predictions_made: AtomicU64::new(0),
            predictions_hit: AtomicU64::new(0),
            pool: Mutex::new(Some(pool)),
        }
    }

    /// Report a completed read (hit or miss). Trains the transition matrix,
    /// then predicts and dispatches background loads for probable next keys.
    pub fn record_access(&self, key: &str) {
        if self.config.window == 0 {
            return;
        }

        // Train: every key currently in the window is a context for this
        // access. Snapshot first so row updates run without the window lock.
        let window_snapshot: Vec<String> = {
            let recent = self.recent.lock();
            recent.iter().cloned().collect()
        };
        for prev in &window_snapshot {
            self.transitions
                .entry(prev.clone())
                .or_insert_with(|| TransitionRow::new(TRANSITION_ROW_CAP))
                .increment(key);
        }

        {
            let mut recent = self.recent.lock();
            recent.push_back(key.to_string());
            while recent.len() > self.config.window {
                recent.pop_front();
            }
        }

        self.predict_and_dispatch(key);
        self.expire_stale_predictions();
    }

    /// Report that a foreground read hit. If the key was predicted inside
    /// the expiry window, the prediction counts as a hit; either way the
    /// stamp is consumed.
    pub fn on_read_hit(&self, key: &str) {
        if let Some((_, stamped_at)) = self.predicted.remove(key) {
            if wall_ms().saturating_sub(stamped_at) < self.config.expiry_ms {
                self.predictions_hit.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// `predictions_hit / max(1, predictions_made)`.
    pub fn accuracy(&self) -> f64 {
        let made = self.predictions_made.load(Ordering::Relaxed);
        if made == 0 {
            return 0.0;
        }
        self.predictions_hit.load(Ordering::Relaxed) as f64 / made as f64
    }

    pub fn predictions_made(&self) -> u64 {
        self.predictions_made.load(Ordering::Relaxed)
    }

    pub fn predictions_hit(&self) -> u64 {
        self.predictions_hit.load(Ordering::Relaxed)
    }

    /// Stop the loader pool, draining in-flight loads briefly.
    /// Subsequent accesses still train the matrix but dispatch nothing.
    pub fn shutdown(&self) {
        if let Some(pool) = self.pool.lock().take() {
            tracing::info!("prefetcher shutting down");
            pool.shutdown();
        }
    }

    fn predict_and_dispatch(&self, current: &str) {
        let predicted = match self.transitions.get(current) {
            Some(row) => row.top_predictions(self.config.top_n, self.config.confidence),
            None => return,
        };
        if predicted.is_empty() {
            return;
        }

        let now = wall_ms();
        for prediction in predicted {
            // Cheap read-lock probe; loads are only dispatched for absent keys.
            if self.store.contains(&prediction.key) {
                continue;
            }

            self.predicted.insert(prediction.key.clone(), now);

            let store = self.store.clone();
            let loader = self.loader.clone();
            let fill_ttl = self.config.fill_ttl_s;
            let target = prediction.key.clone();
            let pool = self.pool.lock();
            let submitted = pool.as_ref().is_some_and(|pool| {
                pool.execute(move || {
                    // Re-probe: a foreground write may have raced the queue.
                    if store.contains(&target) {
                        return;
                    }
                    match loader.load(&target) {
                        Some(value) => {
                            store.put(target.clone(), value, fill_ttl);
                            tracing::debug!(key = %target, "prefetched");
                        }
                        None => {
                            tracing::debug!(key = %target, "prefetch load returned nothing");
                        }
                    }
                })
            });
            drop(pool);

            if submitted {
                // Charged exactly once per dispatch, whether or not the
                // load ultimately succeeds.
                self.predictions_made.fetch_add(1, Ordering::Relaxed);
            } else {
                self.predicted.remove(&prediction.key);
            }
        }
    }

    fn expire_stale_predictions(&self) {
        let cutoff = wall_ms().saturating_sub(self.config.expiry_ms);
        self.predicted.retain(|_, stamped_at| *stamped_at >= cutoff);
    }
}
