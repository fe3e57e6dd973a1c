//! Pattern detector (§4.4.6).
//!
//! A hook for future ML-based scoring. Must be pure over its inputs: given
//! the same transaction data and the same signature list, it always
//! produces the same confidence. The signature list itself is mutable at
//! runtime (`add_pattern`/`remove_pattern`), mirroring the original engine's
//! `update_threat_signatures`, so the hook is genuinely pluggable rather
//! than a static table.

use parking_lot::RwLock;

use super::DetectionContext;
use crate::types::{ConfidenceTier, Opportunity, OpportunityType, RiskBreakdown, Transaction};

const PER_MATCH_CONFIDENCE: f64 = 0.2;
const DEADLINE_BLOCKS: u32 = 1;

pub struct PatternDetector {
    patterns: RwLock<Vec<Vec<u8>>>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
        }
    }

    pub fn add_pattern(&self, pattern: Vec<u8>) {
        self.patterns.write().push(pattern);
    }

    pub fn remove_pattern(&self, pattern: &[u8]) {
        self.patterns.write().retain(|p| p != pattern);
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }

    /// Pure scan: each substring match in `tx.data_blob` adds 0.2 confidence,
    /// capped at 1.0.
    pub fn detect(&self, tx: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
        let patterns = self.patterns.read();
        if patterns.is_empty() {
            return Vec::new();
        }

        let match_count = patterns
            .iter()
            .filter(|p| !p.is_empty() && contains_subsequence(&tx.data_blob, p))
            .count();

        if match_count == 0 {
            return Vec::new();
        }

        let confidence = (match_count as f64 * PER_MATCH_CONFIDENCE).min(1.0);
        let detected_at = ctx.clock.now_ns();

        vec![Opportunity {
            id: format!("pattern_{}", tx.hash),
            opportunity_type: OpportunityType::Unknown,
            confidence_tier: ConfidenceTier::from_score(confidence),
            confidence_score: confidence,
            estimated_profit_usd: rust_decimal::Decimal::ZERO,
            required_gas: tx.gas_limit,
            optimal_gas_price: tx.gas_price_wei,
            execution_deadline_blocks: DEADLINE_BLOCKS,
            detected_at,
            expires_at: detected_at + 12_000_000_000,
            involved_tx_hashes: vec![tx.hash.clone()],
            victim_tx: None,
            sandwich_details: None,
            arbitrage_path: None,
            risk_breakdown: RiskBreakdown {
                execution: 0.0,
                market: 0.0,
                competition: 0.0,
                gas: 0.0,
                overall: 0.0,
            },
        }]
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::DetectionConfig;
    use crate::mempool::MempoolSnapshot;
    use crate::pool_store::{PoolStore, PriceStore};
    use crate::returns::HistoricalReturns;
    use rust_decimal_macros::dec;

    fn sample_tx(data: Vec<u8>) -> Transaction {
        Transaction {
            hash: "t".to_string(),
            from: "f".to_string(),
            to: "t".to_string(),
            value: dec!(0),
            gas_limit: 100_000,
            gas_price_wei: 10,
            data_blob: data,
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: None,
        }
    }

    #[test]
    fn empty_pattern_set_detects_nothing() {
        let detector = PatternDetector::new();
        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(10);
        let config = DetectionConfig::default();
        let ctx = DetectionContext {
            clock: &clock,
            pools: &pools,
            prices: &prices,
            returns: &returns,
            mempool: &mempool,
            config: &config,
            eth_price_usd: dec!(2000),
            competing_bots_estimate: 0,
        };
        assert!(detector.detect(&sample_tx(vec![1, 2, 3]), &ctx).is_empty());
    }

    #[test]
    fn registered_pattern_is_deterministic() {
        let detector = PatternDetector::new();
        detector.add_pattern(vec![0xde, 0xad]);
        let tx = sample_tx(vec![0x01, 0xde, 0xad, 0x02]);

        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(10);
        let config = DetectionConfig::default();
        let ctx = DetectionContext {
            clock: &clock,
            pools: &pools,
            prices: &prices,
            returns: &returns,
            mempool: &mempool,
            config: &config,
            eth_price_usd: dec!(2000),
            competing_bots_estimate: 0,
        };

        let first = detector.detect(&tx, &ctx);
        let second = detector.detect(&tx, &ctx);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].confidence_score, second[0].confidence_score);
    }
}
