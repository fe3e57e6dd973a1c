//! Lock-free counters and a rolling snapshot ring for telemetry (C2).
//!
//! Counter updates are individually atomic; a `PerformanceSnapshot` reads
//! every counter once and is not globally consistent across counters by
//! construction — an accepted tradeoff rather than one worked around.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const SNAPSHOT_RING_CAPACITY: usize = 10_000;
const LATENCY_RESERVOIR_CAPACITY: usize = 4_096;

/// Point-in-time read of every counter. Produced on demand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub taken_at_ns: u64,
    pub total_transactions_analyzed: u64,
    pub threats_detected: u64,
    pub opportunities_published: u64,
    pub trades_validated: u64,
    pub trades_denied: u64,
    pub breaker_trips: u64,
    pub protection_attempts: u64,
    pub protection_successes: u64,
    pub relay_failures: u64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
    pub p999_latency_us: u64,
}

/// Atomic counter bank plus a bounded ring of snapshots and a latency
/// reservoir for percentile estimation, generalized past message/signal/
/// trade counts to the full opportunity-lifecycle surface this core tracks.
pub struct MetricsRing {
    start: Instant,
    total_transactions_analyzed: AtomicU64,
    threats_detected: AtomicU64,
    opportunities_published: AtomicU64,
    trades_validated: AtomicU64,
    trades_denied: AtomicU64,
    breaker_trips: AtomicU64,
    protection_attempts: AtomicU64,
    protection_successes: AtomicU64,
    relay_failures: AtomicU64,
    latency_reservoir: Mutex<VecDeque<u64>>,
    snapshots: Mutex<VecDeque<PerformanceSnapshot>>,
}

impl Default for MetricsRing {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRing {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            total_transactions_analyzed: AtomicU64::new(0),
            threats_detected: AtomicU64::new(0),
            opportunities_published: AtomicU64::new(0),
            trades_validated: AtomicU64::new(0),
            trades_denied: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
            protection_attempts: AtomicU64::new(0),
            protection_successes: AtomicU64::new(0),
            relay_failures: AtomicU64::new(0),
            latency_reservoir: Mutex::new(VecDeque::with_capacity(LATENCY_RESERVOIR_CAPACITY)),
            snapshots: Mutex::new(VecDeque::with_capacity(SNAPSHOT_RING_CAPACITY)),
        }
    }

    pub fn incr_transactions_analyzed(&self) {
        self.total_transactions_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_threats_detected(&self) {
        self.threats_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_opportunities_published(&self) {
        self.opportunities_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_trades_validated(&self) {
        self.trades_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_trades_denied(&self) {
        self.trades_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_breaker_trips(&self) {
        self.breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_protection_attempts(&self) {
        self.protection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_protection_successes(&self) {
        self.protection_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_relay_failures(&self) {
        self.relay_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one execution-latency sample in microseconds for percentile
    /// tracking. Reservoir is a bounded FIFO, not a true uniform-sampling
    /// reservoir, which is sufficient at this scale and avoids an RNG on a
    /// hot path.
    pub fn record_latency_us(&self, latency_us: u64) {
        let mut reservoir = self.latency_reservoir.lock();
        if reservoir.len() == LATENCY_RESERVOIR_CAPACITY {
            reservoir.pop_front();
        }
        reservoir.push_back(latency_us);
    }

    /// Number of latency samples currently held in the reservoir.
    pub fn latency_sample_count(&self) -> usize {
        self.latency_reservoir.lock().len()
    }

    fn percentile(sorted: &[u64], pct: f64) -> u64 {
        if sorted.is_empty() {
            return 0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * pct).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Atomically reads every counter and produces an immutable snapshot,
    /// pushing it onto the bounded ring (oldest evicted first).
    pub fn snapshot(&self, taken_at_ns: u64) -> PerformanceSnapshot {
        let mut samples: Vec<u64> = self.latency_reservoir.lock().iter().copied().collect();
        samples.sort_unstable();

        let snap = PerformanceSnapshot {
            taken_at_ns,
            total_transactions_analyzed: self.total_transactions_analyzed.load(Ordering::Relaxed),
            threats_detected: self.threats_detected.load(Ordering::Relaxed),
            opportunities_published: self.opportunities_published.load(Ordering::Relaxed),
            trades_validated: self.trades_validated.load(Ordering::Relaxed),
            trades_denied: self.trades_denied.load(Ordering::Relaxed),
            breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
            protection_attempts: self.protection_attempts.load(Ordering::Relaxed),
            protection_successes: self.protection_successes.load(Ordering::Relaxed),
            relay_failures: self.relay_failures.load(Ordering::Relaxed),
            p50_latency_us: Self::percentile(&samples, 0.50),
            p95_latency_us: Self::percentile(&samples, 0.95),
            p99_latency_us: Self::percentile(&samples, 0.99),
            p999_latency_us: Self::percentile(&samples, 0.999),
        };

        let mut ring = self.snapshots.lock();
        if ring.len() == SNAPSHOT_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(snap);
        snap
    }

    pub fn recent_snapshots(&self, n: usize) -> Vec<PerformanceSnapshot> {
        let ring = self.snapshots.lock();
        ring.iter().rev().take(n).copied().collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}
