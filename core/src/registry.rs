//! Opportunity Registry (C7).
//!
//! Owns published opportunities for the interval `[detected_at, expires_at]`.
//! Callbacks fire synchronously on insert with a copy of the opportunity;
//! they must not re-enter the registry, a discipline enforced by giving
//! subscribers only an owned `Opportunity`, never a handle back into the
//! registry itself.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::types::{ConfidenceTier, Opportunity, OpportunityType};

type ThreatCallback = Box<dyn Fn(&Opportunity) + Send + Sync>;

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, Opportunity>,
}

pub struct OpportunityRegistry {
    max_size: usize,
    inner: RwLock<Inner>,
    callbacks: RwLock<Vec<ThreatCallback>>,
}

impl OpportunityRegistry {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            inner: RwLock::new(Inner::default()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe_threats<F>(&self, callback: F)
    where
        F: Fn(&Opportunity) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Inserts `opportunity` if not already present; on id conflict, retains
    /// whichever copy has the higher confidence score. Evicts by soonest
    /// expiry, then lowest confidence, when at capacity.
    pub fn publish(&self, opportunity: Opportunity) {
        {
            let mut inner = self.inner.write();
            let should_insert = match inner.by_id.get(&opportunity.id) {
                Some(existing) => opportunity.confidence_score > existing.confidence_score,
                None => true,
            };
            if !should_insert {
                return;
            }

            if inner.by_id.len() >= self.max_size && !inner.by_id.contains_key(&opportunity.id) {
                Self::evict_one(&mut inner);
            }

            inner.by_id.insert(opportunity.id.clone(), opportunity.clone());
        }

        let callbacks = self.callbacks.read();
        for cb in callbacks.iter() {
            cb(&opportunity);
        }
    }

    fn evict_one(inner: &mut Inner) {
        let victim_id = inner
            .by_id
            .values()
            .min_by(|a, b| {
                a.expires_at
                    .cmp(&b.expires_at)
                    .then(a.confidence_score.partial_cmp(&b.confidence_score).unwrap())
            })
            .map(|o| o.id.clone());
        if let Some(id) = victim_id {
            inner.by_id.remove(&id);
        } else {
            warn!("opportunity registry at capacity but no eviction candidate found");
        }
    }

    /// Removes every opportunity whose `expires_at < now_ns`.
    pub fn sweep_expired(&self, now_ns: u64) {
        let mut inner = self.inner.write();
        inner.by_id.retain(|_, o| o.expires_at >= now_ns);
    }

    pub fn by_type(&self, opportunity_type: OpportunityType) -> Vec<Opportunity> {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|o| o.opportunity_type == opportunity_type)
            .cloned()
            .collect()
    }

    pub fn by_min_confidence(&self, tier: ConfidenceTier) -> Vec<Opportunity> {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|o| o.confidence_tier >= tier)
            .cloned()
            .collect()
    }

    pub fn recent(&self, window_ns: u64, now_ns: u64) -> Vec<Opportunity> {
        let floor = now_ns.saturating_sub(window_ns);
        self.inner
            .read()
            .by_id
            .values()
            .filter(|o| o.detected_at >= floor)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn opp(id: &str, confidence: f64, detected_at: u64, expires_at: u64) -> Opportunity {
        Opportunity {
            id: id.to_string(),
            opportunity_type: OpportunityType::Arbitrage,
            confidence_tier: ConfidenceTier::from_score(confidence),
            confidence_score: confidence,
            estimated_profit_usd: dec!(100),
            required_gas: 100_000,
            optimal_gas_price: 30,
            execution_deadline_blocks: 2,
            detected_at,
            expires_at,
            involved_tx_hashes: vec![],
            victim_tx: None,
            sandwich_details: None,
            arbitrage_path: None,
            risk_breakdown: crate::types::RiskBreakdown {
                execution: 0.0,
                market: 0.0,
                competition: 0.0,
                gas: 0.0,
                overall: 0.0,
            },
        }
    }

    #[test]
    fn conflict_keeps_higher_confidence() {
        let registry = OpportunityRegistry::new(10);
        registry.publish(opp("a", 0.5, 0, 100));
        registry.publish(opp("a", 0.3, 0, 100));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.by_type(OpportunityType::Arbitrage)[0].confidence_score,
            0.5
        );

        registry.publish(opp("a", 0.9, 0, 100));
        assert_eq!(
            registry.by_type(OpportunityType::Arbitrage)[0].confidence_score,
            0.9
        );
    }

    #[test]
    fn sweep_removes_expired() {
        let registry = OpportunityRegistry::new(10);
        registry.publish(opp("a", 0.5, 0, 50));
        registry.publish(opp("b", 0.5, 0, 150));
        registry.sweep_expired(100);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn callback_receives_published_copy() {
        let registry = OpportunityRegistry::new(10);
        let seen: std::sync::Arc<parking_lot::Mutex<Vec<String>>> =
            std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.subscribe_threats(move |o| seen_clone.lock().push(o.id.clone()));
        registry.publish(opp("a", 0.5, 0, 100));
        assert_eq!(seen.lock().as_slice(), &["a".to_string()]);
    }

    #[test]
    fn eviction_prefers_soonest_expiry_then_lowest_confidence() {
        let registry = OpportunityRegistry::new(2);
        registry.publish(opp("a", 0.9, 0, 100));
        registry.publish(opp("b", 0.2, 0, 200));
        registry.publish(opp("c", 0.5, 0, 300));
        assert_eq!(registry.len(), 2);
        assert!(registry.by_type(OpportunityType::Arbitrage)
            .iter()
            .all(|o| o.id != "a"));
    }
}
