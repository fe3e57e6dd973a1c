//! Relay health tracking (C9, §4.8 "Relay health").
//!
//! A relay is excluded from selection after `max_consecutive_failures`
//! within `failure_window`, and reconsidered only after `backoff` has
//! elapsed since its last failure — this is what lets the router retry a
//! relay that recovers rather than blacklisting it forever.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelayHealth {
    pub connected: bool,
    pub last_success_ns: u64,
    pub last_failure_ns: u64,
    pub failures_in_window: u32,
}

impl Default for RelayHealth {
    fn default() -> Self {
        Self {
            connected: true,
            last_success_ns: 0,
            last_failure_ns: 0,
            failures_in_window: 0,
        }
    }
}

pub struct RelayRegistry {
    health: DashMap<String, RelayHealth>,
    max_consecutive_failures: u32,
    backoff_ns: u64,
}

impl RelayRegistry {
    pub fn new(max_consecutive_failures: u32, backoff_ns: u64) -> Self {
        Self {
            health: DashMap::new(),
            max_consecutive_failures,
            backoff_ns,
        }
    }

    pub fn record_success(&self, relay_id: &str, now_ns: u64) {
        let mut entry = self.health.entry(relay_id.to_string()).or_default();
        entry.connected = true;
        entry.last_success_ns = now_ns;
        entry.failures_in_window = 0;
    }

    pub fn record_failure(&self, relay_id: &str, now_ns: u64) {
        let mut entry = self.health.entry(relay_id.to_string()).or_default();
        entry.last_failure_ns = now_ns;
        entry.failures_in_window += 1;
        if entry.failures_in_window >= self.max_consecutive_failures {
            entry.connected = false;
        }
    }

    /// A relay never seen before is assumed reachable. One excluded for
    /// repeated failures becomes reconsidered again once `backoff_ns` has
    /// elapsed since its last failure.
    pub fn is_available(&self, relay_id: &str, now_ns: u64) -> bool {
        match self.health.get(relay_id) {
            None => true,
            Some(health) if health.connected => true,
            Some(health) => now_ns.saturating_sub(health.last_failure_ns) >= self.backoff_ns,
        }
    }

    pub fn health_of(&self, relay_id: &str) -> RelayHealth {
        self.health.get(relay_id).map(|e| *e).unwrap_or_default()
    }

    pub fn reachable<'a>(&self, candidates: &'a [String], now_ns: u64) -> Vec<&'a str> {
        candidates
            .iter()
            .map(String::as_str)
            .filter(|id| self.is_available(id, now_ns))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_excluded_after_consecutive_failures_then_reconsidered_after_backoff() {
        let registry = RelayRegistry::new(2, 1_000);
        assert!(registry.is_available("flashbots", 0));
        registry.record_failure("flashbots", 0);
        assert!(registry.is_available("flashbots", 0));
        registry.record_failure("flashbots", 1);
        assert!(!registry.is_available("flashbots", 1));
        assert!(!registry.is_available("flashbots", 500));
        assert!(registry.is_available("flashbots", 1_001));
    }

    #[test]
    fn success_clears_failure_streak() {
        let registry = RelayRegistry::new(2, 1_000);
        registry.record_failure("eden", 0);
        registry.record_success("eden", 1);
        assert_eq!(registry.health_of("eden").failures_in_window, 0);
        assert!(registry.is_available("eden", 1));
    }
}
