//! Monotonic clock and identity generation (C1).
//!
//! Hot detection and registry paths must never touch the wall clock directly.
//! A background task refreshes a cached nanosecond timestamp at a fixed
//! interval; readers take a single atomic load. `precise_now_ns` is kept for
//! the few call sites (breaker timer resets, opportunity expiry) where an
//! extra syscall is an acceptable trade for avoiding cache staleness.

use std::sync::atomic::{AtomicU64, AtomicU64 as AtomicCounter, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1);

fn real_now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Cached monotonic-ish nanosecond clock, refreshed by a background task.
#[derive(Clone)]
pub struct Clock {
    cached_ns: Arc<AtomicU64>,
    opportunity_seq: Arc<AtomicCounter>,
}

impl Clock {
    /// Construct a clock and spawn its refresh task. The returned handle can
    /// be dropped; the refresh task keeps running until the runtime shuts
    /// down (callers that need clean shutdown should abort it explicitly).
    pub fn start() -> (Self, JoinHandle<()>) {
        Self::start_with_interval(DEFAULT_UPDATE_INTERVAL)
    }

    pub fn start_with_interval(interval: Duration) -> (Self, JoinHandle<()>) {
        let cached_ns = Arc::new(AtomicU64::new(real_now_ns()));
        let handle = {
            let cached_ns = cached_ns.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    cached_ns.store(real_now_ns(), Ordering::Relaxed);
                }
            })
        };
        (
            Self {
                cached_ns,
                opportunity_seq: Arc::new(AtomicCounter::new(0)),
            },
            handle,
        )
    }

    /// Build a clock without a refresh task, for unit tests that want
    /// deterministic control. `now_ns` falls back to a single real read
    /// seeded at construction and is not refreshed afterward.
    pub fn for_test() -> Self {
        Self {
            cached_ns: Arc::new(AtomicU64::new(real_now_ns())),
            opportunity_seq: Arc::new(AtomicCounter::new(0)),
        }
    }

    /// Cached monotonic nanosecond timestamp. Single atomic load.
    pub fn now_ns(&self) -> u64 {
        self.cached_ns.load(Ordering::Relaxed)
    }

    /// Uncached, syscall-backed timestamp for call sites that cannot
    /// tolerate up to one refresh interval of staleness.
    pub fn precise_now_ns(&self) -> u64 {
        real_now_ns()
    }

    /// Process-unique, monotonically increasing opportunity identifier.
    pub fn new_opportunity_id(&self) -> String {
        let seq = self.opportunity_seq.fetch_add(1, Ordering::Relaxed);
        format!("mev_{seq:08}")
    }

    /// Stable cache key for a transaction hash.
    pub fn cache_key(tx_hash: &str) -> String {
        tx_hash.to_string()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::for_test()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opportunity_ids_are_unique_and_ordered() {
        let clock = Clock::for_test();
        let a = clock.new_opportunity_id();
        let b = clock.new_opportunity_id();
        assert_ne!(a, b);
        assert_eq!(a, "mev_00000000");
        assert_eq!(b, "mev_00000001");
    }

    #[test]
    fn cache_key_is_identity_over_hash() {
        assert_eq!(Clock::cache_key("0xabc"), "0xabc");
    }
}
