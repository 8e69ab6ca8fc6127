//! Clock helpers.
//!
//! Entries store timestamps as plain integers so access bookkeeping can use
//! atomics: monotonic nanoseconds (relative to a process-wide epoch) for
//! recency and age, wall-clock milliseconds for expiration, which must
//! survive restarts via snapshots.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanoseconds since the first call in this process.
#[inline]
pub fn mono_ns() -> u64 {
    let epoch = *PROCESS_EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Wall-clock milliseconds since the Unix epoch.
#[inline]
pub fn wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_ns_is_monotonic() {
        let a = mono_ns();
        let b = mono_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_wall_ms_is_plausible() {
        // After 2020-01-01 in milliseconds.
        assert!(wall_ms() > 1_577_836_800_000);
    }
}
