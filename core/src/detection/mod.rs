//! Detection Kernel (C6).
//!
//! A detector is a pure function over one transaction plus read access to
//! the pool/price/returns/mempool stores. The kernel composes the enabled
//! detectors, dedupes by opportunity id, filters by the configured
//! confidence/profit floor, and hands survivors to the registry. Detectors
//! are a closed set of tagged implementations rather than trait objects,
//! per the "virtual dispatch" design note — the one exception is the
//! pattern detector, which genuinely needs to be pluggable (§4.4.6) and is
//! therefore the sole `dyn` boundary.

pub mod arbitrage;
pub mod frontrun;
pub mod jit;
pub mod liquidation;
pub mod pattern;
pub mod risk_scoring;
pub mod sandwich;

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::clock::Clock;
use crate::config::DetectionConfig;
use crate::error::{CoreError, CoreResult};
use crate::mempool::MempoolSnapshot;
use crate::pool_store::{PoolStore, PriceStore};
use crate::returns::HistoricalReturns;
use crate::types::{Opportunity, OpportunityType, Transaction};

pub use pattern::PatternDetector;

/// Shared read-only context every detector receives alongside the candidate
/// transaction.
pub struct DetectionContext<'a> {
    pub clock: &'a Clock,
    pub pools: &'a PoolStore,
    pub prices: &'a PriceStore,
    pub returns: &'a HistoricalReturns,
    pub mempool: &'a MempoolSnapshot,
    pub config: &'a DetectionConfig,
    pub eth_price_usd: Decimal,
    /// Estimate of bots competing for the same opportunity, fed into risk
    /// scoring (§4.4.7). Supplied by the caller since the core has no
    /// first-hand view of competitor mempools.
    pub competing_bots_estimate: u32,
}

impl DetectionContext<'_> {
    /// USD value of `amount` of `token`. Raises `CoreError::DataStale` when
    /// no price record exists rather than fabricating a 1:1 rate, per §7.6:
    /// detection must return an empty opportunity list, not a wrong-magnitude
    /// estimate, when required price data is missing.
    pub fn usd_value(&self, token: &str, amount: Decimal) -> CoreResult<Decimal> {
        match self.prices.price_of(token) {
            Some(p) => Ok(amount * p.usd_price),
            None => Err(CoreError::DataStale(format!("no price record for {token}"))),
        }
    }
}

/// Composes the fixed detector set plus any registered pattern detectors,
/// dedupes, and filters against the configured floor.
pub struct DetectionKernel {
    pattern_detectors: Vec<Arc<PatternDetector>>,
}

impl Default for DetectionKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionKernel {
    pub fn new() -> Self {
        Self {
            pattern_detectors: Vec::new(),
        }
    }

    pub fn register_pattern_detector(&mut self, detector: Arc<PatternDetector>) {
        self.pattern_detectors.push(detector);
    }

    /// Runs every enabled detector against `tx`, dedupes by `id`, and
    /// applies the confidence/profit floor (§4.4 kernel contract).
    pub fn analyze(&self, tx: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
        if !ctx.config.enable_detection {
            return Vec::new();
        }

        let mut found = Vec::new();
        found.extend(sandwich::detect(tx, ctx));
        found.extend(frontrun::detect(tx, ctx));
        found.extend(arbitrage::detect(tx, ctx));
        found.extend(liquidation::detect(tx, ctx));
        found.extend(jit::detect(tx, ctx));
        for detector in &self.pattern_detectors {
            found.extend(detector.detect(tx, ctx));
        }

        let mut seen_ids = HashSet::new();
        found.retain(|o| seen_ids.insert(o.id.clone()));

        found.retain(|o| {
            let passes = o.confidence_score >= ctx.config.min_confidence
                && o.estimated_profit_usd >= ctx.config.min_profit_usd;
            if !passes {
                debug!(
                    opportunity_id = %o.id,
                    confidence = o.confidence_score,
                    profit_usd = %o.estimated_profit_usd,
                    "opportunity filtered below configured floor"
                );
            }
            passes
        });

        found.retain(|o| {
            let is_protection_context = matches!(
                o.opportunity_type,
                OpportunityType::Sandwich | OpportunityType::Frontrun | OpportunityType::Liquidation | OpportunityType::JitLiquidity
            );
            let threat_exceeds_threshold = o.estimated_profit_usd >= ctx.config.min_profit_usd;
            let passes = is_profitable(
                o.estimated_profit_usd,
                o.required_gas,
                o.optimal_gas_price,
                ctx.eth_price_usd,
                is_protection_context,
                threat_exceeds_threshold,
            );
            if !passes {
                debug!(
                    opportunity_id = %o.id,
                    profit_usd = %o.estimated_profit_usd,
                    "opportunity filtered as unprofitable after gas"
                );
            }
            passes
        });

        found
    }
}

/// Profitability test (§4.4.8): an opportunity is retained only if its net
/// profit (after gas) is positive, unless the caller is evaluating a threat
/// to a user transaction rather than a self-directed trade.
pub fn net_profit_usd(
    estimated_profit_usd: Decimal,
    required_gas: u64,
    optimal_gas_price: u64,
    eth_price_usd: Decimal,
) -> Decimal {
    // required_gas * optimal_gas_price (gwei) * eth_price_usd * 1e-9, per §4.4.8.
    let gas_cost_usd = Decimal::from(required_gas) * Decimal::from(optimal_gas_price) * eth_price_usd
        / Decimal::from(1_000_000_000u64);
    estimated_profit_usd - gas_cost_usd
}

pub fn is_profitable(
    estimated_profit_usd: Decimal,
    required_gas: u64,
    optimal_gas_price: u64,
    eth_price_usd: Decimal,
    is_protection_context: bool,
    threat_exceeds_threshold: bool,
) -> bool {
    if is_protection_context {
        return threat_exceeds_threshold;
    }
    net_profit_usd(estimated_profit_usd, required_gas, optimal_gas_price, eth_price_usd) > Decimal::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn net_profit_subtracts_gas_cost() {
        // gas_cost_usd = 150_000 * 30 gwei * $2000 / 1e9 == $9.
        let profit = net_profit_usd(dec!(100), 150_000, 30, dec!(2000));
        assert_eq!(profit, dec!(91));
    }

    #[test]
    fn protection_context_ignores_profitability() {
        assert!(is_profitable(dec!(-5), 1, 1, dec!(2000), true, true));
        assert!(!is_profitable(dec!(-5), 1, 1, dec!(2000), true, false));
    }
}
