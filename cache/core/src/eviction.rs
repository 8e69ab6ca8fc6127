//! Eviction policies: victim selection over a segment's entry table.
//!
//! Policies scan the table linearly. Segments are intentionally small, so a
//! scan beats maintaining auxiliary ordering structures under the write lock.

use std::collections::HashMap;

use crate::config::PolicyKind;
use crate::entry::Entry;

/// Strategy hooks a segment calls around table mutations.
///
/// `on_access` may run while only the segment read lock is held, so stateful
/// policies must use interior mutability. The two shipped policies derive
/// their ordering from entry metadata and keep no state of their own.
pub trait EvictionPolicy: Send + Sync {
    /// Pick the key to evict, or `None` when the table is empty.
    fn select_victim(&self, table: &HashMap<String, Entry>) -> Option<String>;

    /// An entry was read.
    fn on_access(&self, _key: &str, _entry: &Entry) {}

    /// An entry was inserted or replaced.
    fn on_insert(&self, _key: &str, _entry: &Entry) {}

    /// An entry was removed (delete, expiry, or eviction).
    fn on_remove(&self, _key: &str) {}
}

/// Least recently used: victim is the entry with the oldest access time.
pub struct Lru;

impl EvictionPolicy for Lru {
    fn select_victim(&self, table: &HashMap<String, Entry>) -> Option<String> {
        table
            .iter()
            .min_by_key(|(_, entry)| entry.last_access())
            .map(|(key, _)| key.clone())
    }
}

/// Least frequently used: victim is the entry with the lowest access count,
/// ties broken by the older access time.
pub struct Lfu;

impl EvictionPolicy for Lfu {
    fn select_victim(&self, table: &HashMap<String, Entry>) -> Option<String> {
        table
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count(), entry.last_access()))
            .map(|(key, _)| key.clone())
    }
}

/// Instantiate the policy for a segment.
pub fn create_policy(kind: PolicyKind) -> Box<dyn EvictionPolicy> {
    match kind {
        PolicyKind::Lru => Box::new(Lru),
        PolicyKind::Lfu => Box::new(Lfu),
    }
}
