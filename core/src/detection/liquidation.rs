//! Liquidation detector (§4.4.4).
//!
//! Matches known lending-protocol `liquidate` entrypoints by function
//! selector. The selector set is a narrow, closed list rather than a
//! pluggable registry since liquidation entrypoints are stable ABI
//! constants, unlike the pattern detector's evolving signature list.

use rust_decimal_macros::dec;

use super::risk_scoring;
use super::DetectionContext;
use crate::types::{ConfidenceTier, Opportunity, OpportunityType, RiskBreakdown, Transaction};

const LIQUIDATION_CONFIDENCE: f64 = 0.8;
const DEADLINE_BLOCKS: u32 = 2;

/// 4-byte selectors for `liquidate`/`liquidationCall` style entrypoints
/// across common lending protocols (Compound, Aave-style).
const LIQUIDATION_SELECTORS: &[[u8; 4]] = &[
    [0xf5, 0xe3, 0xc4, 0x62], // liquidateBorrow(address,uint256,address)
    [0x00, 0xa7, 0x18, 0xa9], // liquidationCall(address,address,address,uint256,bool)
];

pub fn detect(tx: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
    let Some(selector) = tx.function_selector() else {
        return Vec::new();
    };
    if !LIQUIDATION_SELECTORS.contains(&selector) {
        return Vec::new();
    }

    let risk_breakdown = RiskBreakdown {
        execution: risk_scoring::score(
            risk_scoring::ExecutionInputs {
                required_gas: tx.gas_limit,
                competing_bots: ctx.competing_bots_estimate,
            },
            risk_scoring::MarketInputs { volatility: 0.0 },
            0.0,
        )
        .execution,
        market: 0.0,
        competition: (ctx.competing_bots_estimate as f64 / 50.0).clamp(0.0, 1.0),
        gas: (tx.gas_limit as f64 / 1_000_000.0).clamp(0.0, 1.0),
        overall: 0.0,
    };
    let overall = 0.5 * risk_breakdown.execution + 0.2 * risk_breakdown.competition;
    let risk_breakdown = RiskBreakdown {
        overall,
        ..risk_breakdown
    };

    let detected_at = ctx.clock.now_ns();
    let estimated_profit_usd = tx.value * ctx.eth_price_usd * dec!(0.05);

    vec![Opportunity {
        id: format!("liquidation_{}", tx.hash),
        opportunity_type: OpportunityType::Liquidation,
        confidence_tier: ConfidenceTier::from_score(LIQUIDATION_CONFIDENCE),
        confidence_score: LIQUIDATION_CONFIDENCE,
        estimated_profit_usd,
        required_gas: tx.gas_limit,
        optimal_gas_price: tx.gas_price_wei,
        execution_deadline_blocks: DEADLINE_BLOCKS,
        detected_at,
        expires_at: detected_at + 24_000_000_000,
        involved_tx_hashes: vec![tx.hash.clone()],
        victim_tx: None,
        sandwich_details: None,
        arbitrage_path: None,
        risk_breakdown,
    }]
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

    #[test]
    fn matches_known_liquidation_selector() {
        let tx = Transaction {
            hash: "liq".to_string(),
            from: "f".to_string(),
            to: "t".to_string(),
            value: dec!(1),
            gas_limit: 400_000,
            gas_price_wei: 40,
            data_blob: vec![0xf5, 0xe3, 0xc4, 0x62, 0, 0],
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: None,
        };

        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(100);
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

        let found = detect(&tx, &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence_score, LIQUIDATION_CONFIDENCE);
        assert_eq!(found[0].execution_deadline_blocks, 2);
    }

    #[test]
    fn unknown_selector_yields_no_opportunity() {
        let tx = Transaction {
            hash: "non_liq".to_string(),
            from: "f".to_string(),
            to: "t".to_string(),
            value: dec!(1),
            gas_limit: 400_000,
            gas_price_wei: 40,
            data_blob: vec![0, 0, 0, 0],
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: None,
        };
        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(100);
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
        assert!(detect(&tx, &ctx).is_empty());
    }
}
