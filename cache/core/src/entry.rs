//! A single cache entry: immutable value plus access metadata.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::config::ENTRY_OVERHEAD;
use crate::time::{mono_ns, wall_ms};

/// Sentinel for "no expiration".
const NEVER: u64 = u64::MAX;

/// Value plus the metadata the intelligent subsystems feed on.
///
/// Thread-safe for concurrent access tracking: `touch` may be called while
/// only the segment read lock is held, so the mutable fields are atomics.
#[derive(Debug)]
pub struct Entry {
    value: Bytes,
    /// Monotonic construction instant, nanoseconds.
    created_at: u64,
    /// Wall-clock expiration, milliseconds; `NEVER` when TTL is 0.
    expires_at_ms: AtomicU64,
    /// Monotonic instant of the most recent access, nanoseconds.
    last_access: AtomicU64,
    access_count: AtomicU64,
    /// 32-bit hash of the value bytes, compared across replacements to
    /// detect change for the volatility estimator.
    value_hash: u32,
    /// Reconstruction cost hint carried with the entry.
    compute_cost_ms: u64,
    /// `ENTRY_OVERHEAD + value.len()`. Immutable once set.
    size_bytes: u64,
}

impl Entry {
    /// Create an entry. `ttl_seconds == 0` means the entry never expires.
    pub fn new(value: Bytes, ttl_seconds: u64) -> Self {
        let now = mono_ns();
        let expires_at_ms = if ttl_seconds > 0 {
            wall_ms().saturating_add(ttl_seconds.saturating_mul(1000))
        } else {
            NEVER
        };
        let value_hash = hash_value(&value);
        let size_bytes = ENTRY_OVERHEAD + value.len() as u64;

        Self {
            value,
            created_at: now,
            expires_at_ms: AtomicU64::new(expires_at_ms),
            last_access: AtomicU64::new(now),
            access_count: AtomicU64::new(0),
            value_hash,
            compute_cost_ms: 0,
            size_bytes,
        }
    }

    /// Attach a reconstruction cost hint (milliseconds).
    pub fn with_compute_cost(mut self, cost_ms: u64) -> Self {
        self.compute_cost_ms = cost_ms;
        self
    }

    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// True iff the entry is past its expiration. Exact ties do not expire.
    #[inline]
    pub fn is_expired(&self, now_wall_ms: u64) -> bool {
        now_wall_ms > self.expires_at_ms.load(Ordering::Relaxed)
    }

    /// Record an access: bump the access count and refresh recency.
    ///
    /// Callable without the segment write lock; each field is updated
    /// atomically.
    #[inline]
    pub fn touch(&self) {
        self.last_access.store(mono_ns(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Rewrite the expiration. `ttl_seconds == 0` clears it.
    /// Caller must hold the segment write lock.
    pub fn set_ttl(&self, ttl_seconds: u64) {
        let expires = if ttl_seconds > 0 {
            wall_ms().saturating_add(ttl_seconds.saturating_mul(1000))
        } else {
            NEVER
        };
        self.expires_at_ms.store(expires, Ordering::Relaxed);
    }

    /// Remaining lifetime in whole seconds; `None` when the entry has no TTL.
    pub fn ttl_remaining(&self) -> Option<u64> {
        let expires = self.expires_at_ms.load(Ordering::Relaxed);
        if expires == NEVER {
            return None;
        }
        Some(expires.saturating_sub(wall_ms()) / 1000)
    }

    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Observed access rate extrapolated to a one-hour window.
    pub fn accesses_per_hour(&self) -> f64 {
        let age_ms = (mono_ns().saturating_sub(self.created_at)) / 1_000_000;
        self.access_count() as f64 / age_ms.max(1) as f64 * 3_600_000.0
    }

    #[inline]
    pub fn value_hash(&self) -> u32 {
        self.value_hash
    }

    #[inline]
    pub fn compute_cost_ms(&self) -> u64 {
        self.compute_cost_ms
    }

    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// 32-bit FNV-1a over the value bytes.
fn hash_value(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in data {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_size_includes_overhead() {
        let entry = Entry::new(Bytes::from_static(b"hello"), 0);
        assert_eq!(entry.size_bytes(), ENTRY_OVERHEAD + 5);

        let empty = Entry::new(Bytes::new(), 0);
        assert_eq!(empty.size_bytes(), ENTRY_OVERHEAD);
    }

    #[test]
    fn test_ttl_zero_never_expires() {
        let entry = Entry::new(Bytes::from_static(b"v"), 0);
        assert!(!entry.is_expired(wall_ms() + 1_000_000_000));
        assert_eq!(entry.ttl_remaining(), None);
    }

    #[test]
    fn test_expiry_is_strict() {
        let entry = Entry::new(Bytes::from_static(b"v"), 10);
        let expires = entry.expires_at_ms.load(Ordering::Relaxed);
        assert!(!entry.is_expired(expires));
        assert!(entry.is_expired(expires + 1));
    }

    #[test]
    fn test_touch_updates_bookkeeping() {
        let entry = Entry::new(Bytes::from_static(b"v"), 0);
        assert_eq!(entry.access_count(), 0);
        let before = entry.last_access();
        std::thread::sleep(Duration::from_millis(2));
        entry.touch();
        assert_eq!(entry.access_count(), 1);
        assert!(entry.last_access() > before);
        assert!(entry.last_access() >= entry.created_at());
    }

    #[test]
    fn test_set_ttl_rewrites_expiry() {
        let entry = Entry::new(Bytes::from_static(b"v"), 10);
        entry.set_ttl(600);
        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining > 590 && remaining <= 600);

        entry.set_ttl(0);
        assert_eq!(entry.ttl_remaining(), None);
    }

    #[test]
    fn test_value_hash_tracks_content() {
        let a = Entry::new(Bytes::from_static(b"same"), 0);
        let b = Entry::new(Bytes::from_static(b"same"), 0);
        let c = Entry::new(Bytes::from_static(b"diff"), 0);
        assert_eq!(a.value_hash(), b.value_hash());
        assert_ne!(a.value_hash(), c.value_hash());
    }

    #[test]
    fn test_accesses_per_hour() {
        let entry = Entry::new(Bytes::from_static(b"v"), 0);
        for _ in 0..100 {
            entry.touch();
        }
        std::thread::sleep(Duration::from_millis(10));
        // 100 accesses in ~10ms extrapolates to a very large hourly rate.
        assert!(entry.accesses_per_hour() > 1000.0);
    }

    #[test]
    fn test_compute_cost_hint() {
        let entry = Entry::new(Bytes::from_static(b"v"), 0).with_compute_cost(250);
        assert_eq!(entry.compute_cost_ms(), 250);
        assert_eq!(Entry::new(Bytes::new(), 0).compute_cost_ms(), 0);
    }
}
