//! One striped partition of the store.
//!
//! Each segment owns a table guarded by its own read/write lock, a fixed
//! memory budget, and hit/miss/eviction counters. Counter updates happen
//! while the relevant lock is held; foreign readers use atomic loads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::entry::Entry;
use crate::eviction::EvictionPolicy;
use crate::time::wall_ms;

/// Outcome of a put, reported so the dispatcher can feed the volatility
/// estimator without re-reading the entry.
#[derive(Debug, Clone, Copy)]
pub struct PutOutcome {
    /// Value hash of the entry this put replaced, if any.
    pub old_value_hash: Option<u32>,
    /// Value hash of the entry just stored.
    pub new_value_hash: u32,
}

/// Read-only view of an entry's metadata, taken without perturbing the
/// hit/miss counters or access bookkeeping. Consumed by the adaptive TTL
/// controller and the snapshot writer.
#[derive(Debug, Clone)]
pub struct EntryStats {
    pub size_bytes: u64,
    pub compute_cost_ms: u64,
    pub accesses_per_hour: f64,
    /// Remaining TTL in seconds; `None` for entries without one.
    pub ttl_remaining: Option<u64>,
    pub value_hash: u32,
}

/// A single lock-striped cache partition.
pub struct Segment {
    table: RwLock<HashMap<String, Entry>>,
    policy: Box<dyn EvictionPolicy>,
    budget_bytes: u64,
    memory_used: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Segment {
    pub fn new(policy: Box<dyn EvictionPolicy>, budget_bytes: u64) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            policy,
            budget_bytes,
            memory_used: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key, counting a hit or miss and refreshing recency.
    ///
    /// An entry found expired counts as a miss and is removed before
    /// returning; the removal re-acquires the write lock because the read
    /// lock cannot mutate the table.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = wall_ms();

        {
            let table = self.table.read();
            match table.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.policy.on_access(key, entry);
                    entry.touch();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value().clone());
                }
                Some(_) => {} // expired; fall through to remove under the write lock
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // The entry was expired at observation time. Re-check under the
        // write lock: a concurrent put may have replaced it meanwhile.
        let mut table = self.table.write();
        let still_expired = table
            .get(key)
            .map(|entry| entry.is_expired(wall_ms()))
            .unwrap_or(false);
        if still_expired {
            if let Some(removed) = table.remove(key) {
                self.memory_used
                    .fetch_sub(removed.size_bytes(), Ordering::Relaxed);
                self.policy.on_remove(key);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an entry, evicting until the budget holds.
    ///
    /// Memory accounting uses the replacement delta, not the raw entry size:
    /// replacing a 400-byte entry with a 500-byte one must grow usage by
    /// exactly 100 bytes. The budget may be exceeded transiently inside the
    /// critical section while evictions run, and permanently only when a
    /// single entry is larger than the whole budget.
    pub fn put(&self, key: String, entry: Entry) -> PutOutcome {
        let mut table = self.table.write();

        let existing_size = table.get(&key).map(|e| e.size_bytes()).unwrap_or(0);
        let required = entry.size_bytes() as i64 - existing_size as i64;

        loop {
            let used = self.memory_used.load(Ordering::Relaxed) as i64;
            if used + required <= self.budget_bytes as i64 || table.is_empty() {
                break;
            }
            if !self.evict_one(&mut table) {
                break;
            }
        }

        let new_value_hash = entry.value_hash();
        let new_size = entry.size_bytes();
        let old = table.insert(key.clone(), entry);

        match &old {
            Some(old_entry) => {
                // Replacement: apply the size delta, not the full new size.
                let delta = new_size as i64 - old_entry.size_bytes() as i64;
                if delta >= 0 {
                    self.memory_used.fetch_add(delta as u64, Ordering::Relaxed);
                } else {
                    self.memory_used
                        .fetch_sub((-delta) as u64, Ordering::Relaxed);
                }
                self.policy.on_remove(&key);
            }
            None => {
                self.memory_used.fetch_add(new_size, Ordering::Relaxed);
            }
        }
        if let Some(inserted) = table.get(&key) {
            self.policy.on_insert(&key, inserted);
        }

        PutOutcome {
            old_value_hash: old.map(|e| e.value_hash()),
            new_value_hash,
        }
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut table = self.table.write();
        match table.remove(key) {
            Some(entry) => {
                self.memory_used
                    .fetch_sub(entry.size_bytes(), Ordering::Relaxed);
                self.policy.on_remove(key);
                true
            }
            None => false,
        }
    }

    /// Drop every entry and reset memory accounting.
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.clear();
        self.memory_used.store(0, Ordering::Relaxed);
    }

    /// Rewrite the TTL of a live entry. Returns false when the key is
    /// missing or already expired.
    pub fn set_ttl(&self, key: &str, ttl_seconds: u64) -> bool {
        let table = self.table.write();
        match table.get(key) {
            Some(entry) if !entry.is_expired(wall_ms()) => {
                entry.set_ttl(ttl_seconds);
                true
            }
            _ => false,
        }
    }

    /// Remaining TTL without touching access bookkeeping:
    /// `None` when the key is missing or expired.
    pub fn ttl(&self, key: &str) -> Option<Option<u64>> {
        let table = self.table.read();
        let entry = table.get(key)?;
        if entry.is_expired(wall_ms()) {
            return None;
        }
        Some(entry.ttl_remaining())
    }

    /// Cheap presence probe that leaves the counters alone.
    pub fn contains(&self, key: &str) -> bool {
        let table = self.table.read();
        table
            .get(key)
            .map(|e| !e.is_expired(wall_ms()))
            .unwrap_or(false)
    }

    /// Metadata peek for the TTL controller. Does not count a hit or miss.
    pub fn entry_stats(&self, key: &str) -> Option<EntryStats> {
        let table = self.table.read();
        let entry = table.get(key)?;
        if entry.is_expired(wall_ms()) {
            return None;
        }
        Some(EntryStats {
            size_bytes: entry.size_bytes(),
            compute_cost_ms: entry.compute_cost_ms(),
            accesses_per_hour: entry.accesses_per_hour(),
            ttl_remaining: entry.ttl_remaining(),
            value_hash: entry.value_hash(),
        })
    }

    /// Copy out the live entries for the snapshot writer.
    ///
    /// Weakly consistent by design: concurrent writes may or may not appear.
    pub fn snapshot_records(&self) -> Vec<(String, Bytes, Option<u64>)> {
        let now = wall_ms();
        let table = self.table.read();
        table
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value().clone(), entry.ttl_remaining()))
            .collect()
    }

    /// Snapshot of the key set. Weakly consistent.
    pub fn keys(&self) -> Vec<String> {
        let table = self.table.read();
        table.keys().cloned().collect()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = wall_ms();
        let mut table = self.table.write();
        let expired: Vec<String> = table
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = table.remove(key) {
                self.memory_used
                    .fetch_sub(entry.size_bytes(), Ordering::Relaxed);
                self.policy.on_remove(key);
            }
        }
        expired.len()
    }

    /// Evict a single victim. Caller holds the write lock on `table`.
    fn evict_one(&self, table: &mut HashMap<String, Entry>) -> bool {
        let victim = match self.policy.select_victim(table) {
            Some(key) => key,
            None => return false,
        };
        match table.remove(&victim) {
            Some(entry) => {
                self.memory_used
                    .fetch_sub(entry.size_bytes(), Ordering::Relaxed);
                self.policy.on_remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %victim, "evicted");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn memory_used(&self) -> u64 {
        self.memory_used.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Audit helper: recompute memory usage from the table.
    #[cfg(test)]
    pub fn audit_memory(&self) -> u64 {
        self.table
            .read()
            .values()
            .map(|entry| entry.size_bytes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENTRY_OVERHEAD, PolicyKind};
    use crate::eviction::create_policy;
    use std::time::Duration;

    fn segment(budget: u64) -> Segment {
        Segment::new(create_policy(PolicyKind::Lru), budget)
    }

    fn entry(value: &[u8], ttl: u64) -> Entry {
        Entry::new(Bytes::copy_from_slice(value), ttl)
    }

    #[test]
    fn test_put_get_round_trip() {
        let seg = segment(1024 * 1024);
        seg.put("k".to_string(), entry(b"value", 0));
        assert_eq!(seg.get("k"), Some(Bytes::from_static(b"value")));
        assert_eq!(seg.hits(), 1);
        assert_eq!(seg.misses(), 0);
    }

    #[test]
    fn test_miss_counts() {
        let seg = segment(1024);
        assert_eq!(seg.get("absent"), None);
        assert_eq!(seg.misses(), 1);
    }

    #[test]
    fn test_memory_accounting_exact() {
        let seg = segment(1024 * 1024);
        seg.put("a".to_string(), entry(&[0u8; 100], 0));
        seg.put("b".to_string(), entry(&[0u8; 200], 0));
        assert_eq!(seg.memory_used(), 2 * ENTRY_OVERHEAD + 300);
        assert_eq!(seg.memory_used(), seg.audit_memory());
    }

    #[test]
    fn test_replacement_uses_delta() {
        let seg = segment(1024 * 1024);
        seg.put("k".to_string(), entry(&[0u8; 100], 0));
        let before = seg.memory_used();
        seg.put("k".to_string(), entry(&[0u8; 150], 0));
        // Exactly +50, not +overhead+150. The naive form double-counts.
        assert_eq!(seg.memory_used(), before + 50);
        assert_eq!(seg.memory_used(), seg.audit_memory());

        seg.put("k".to_string(), entry(&[0u8; 10], 0));
        assert_eq!(seg.memory_used(), ENTRY_OVERHEAD + 10);
        assert_eq!(seg.memory_used(), seg.audit_memory());
    }

    #[test]
    fn test_put_reports_replaced_hash() {
        let seg = segment(1024 * 1024);
        let first = seg.put("k".to_string(), entry(b"one", 0));
        assert_eq!(first.old_value_hash, None);

        let second = seg.put("k".to_string(), entry(b"two", 0));
        assert_eq!(second.old_value_hash, Some(first.new_value_hash));
        assert_ne!(second.new_value_hash, first.new_value_hash);
    }

    #[test]
    fn test_eviction_under_pressure() {
        // Room for two 420-byte entries (300-byte values) but not three.
        let seg = segment(1000);
        seg.put("a".to_string(), entry(&[0u8; 300], 0));
        std::thread::sleep(Duration::from_millis(2));
        seg.put("b".to_string(), entry(&[0u8; 300], 0));
        std::thread::sleep(Duration::from_millis(2));
        seg.put("c".to_string(), entry(&[0u8; 300], 0));

        assert!(seg.memory_used() <= 1000);
        assert_eq!(seg.evictions(), 1);
        // LRU drops "a", the least recently inserted.
        assert!(!seg.contains("a"));
        assert!(seg.contains("b"));
        assert!(seg.contains("c"));
    }

    #[test]
    fn test_single_oversized_entry_admitted() {
        let seg = segment(100);
        seg.put("big".to_string(), entry(&[0u8; 500], 0));
        // Documented consequence: a lone entry may exceed the budget.
        assert!(seg.contains("big"));
        assert_eq!(seg.memory_used(), ENTRY_OVERHEAD + 500);
    }

    #[test]
    fn test_delete_idempotent() {
        let seg = segment(1024);
        seg.put("k".to_string(), entry(b"v", 0));
        assert!(seg.delete("k"));
        assert!(!seg.delete("k"));
        assert_eq!(seg.memory_used(), 0);
    }

    #[test]
    fn test_clear() {
        let seg = segment(1024 * 1024);
        seg.put("a".to_string(), entry(b"1", 0));
        seg.put("b".to_string(), entry(b"2", 0));
        seg.clear();
        assert_eq!(seg.len(), 0);
        assert_eq!(seg.memory_used(), 0);
    }

    #[test]
    fn test_expired_get_is_miss_and_removes() {
        let seg = segment(1024);
        seg.put("k".to_string(), entry(b"v", 1));
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(seg.get("k"), None);
        assert_eq!(seg.misses(), 1);
        assert_eq!(seg.len(), 0);
        assert_eq!(seg.memory_used(), 0);
    }

    #[test]
    fn test_sweep_expired() {
        let seg = segment(1024 * 1024);
        seg.put("short".to_string(), entry(b"v", 1));
        seg.put("long".to_string(), entry(b"v", 600));
        seg.put("never".to_string(), entry(b"v", 0));
        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(seg.sweep_expired(), 1);
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.memory_used(), seg.audit_memory());
    }

    #[test]
    fn test_set_ttl() {
        let seg = segment(1024);
        seg.put("k".to_string(), entry(b"v", 10));
        assert!(seg.set_ttl("k", 600));
        let remaining = seg.ttl("k").unwrap().unwrap();
        assert!(remaining > 590);
        assert!(!seg.set_ttl("missing", 5));
    }

    #[test]
    fn test_ttl_variants() {
        let seg = segment(1024);
        seg.put("forever".to_string(), entry(b"v", 0));
        seg.put("bounded".to_string(), entry(b"v", 60));

        assert_eq!(seg.ttl("forever"), Some(None));
        assert!(matches!(seg.ttl("bounded"), Some(Some(_))));
        assert_eq!(seg.ttl("missing"), None);
    }

    #[test]
    fn test_peeks_leave_counters_alone() {
        let seg = segment(1024);
        seg.put("k".to_string(), entry(b"v", 0));
        seg.contains("k");
        seg.entry_stats("k");
        seg.ttl("k");
        seg.snapshot_records();
        assert_eq!(seg.hits(), 0);
        assert_eq!(seg.misses(), 0);
    }
}
