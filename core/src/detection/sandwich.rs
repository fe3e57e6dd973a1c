//! Sandwich detector (§4.4.1).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::DetectionContext;
use super::risk_scoring;
use crate::types::{ConfidenceTier, Opportunity, OpportunityType, SandwichDetails, Transaction};

const COMPETING_TX_CONFIDENCE: f64 = 0.3;
const LARGE_LOW_SLIPPAGE_CONFIDENCE: f64 = 0.4;
const LARGE_SWAP_USD_THRESHOLD: Decimal = dec!(100_000);
const LOW_SLIPPAGE_BPS_THRESHOLD: u32 = 50;
const ESTIMATED_LOSS_RATE: Decimal = dec!(0.002);
const SEVERITY_SCALE: f64 = 0.8;
const DEFAULT_DEADLINE_BLOCKS: u32 = 2;

pub fn detect(victim: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
    let Some(decoded) = victim.decoded.as_ref() else {
        return Vec::new();
    };

    let mempool = ctx.mempool.matching_pool(&decoded.pool_address);
    let suspicious: Vec<&Transaction> = mempool
        .iter()
        .filter(|candidate| {
            candidate.hash != victim.hash
                && candidate.gas_price_wei > victim.gas_price_wei
                && candidate
                    .decoded
                    .as_ref()
                    .is_some_and(|c| c.token_in == decoded.token_out)
        })
        .collect();

    let mut confidence = suspicious.len() as f64 * COMPETING_TX_CONFIDENCE;

    let amount_in_usd = match ctx.usd_value(&decoded.token_in, decoded.amount_in) {
        Ok(v) => v,
        Err(e) => {
            debug!(token = %decoded.token_in, error = %e, "skipping sandwich detection, no price data");
            return Vec::new();
        }
    };
    if amount_in_usd >= LARGE_SWAP_USD_THRESHOLD && decoded.slippage_bps < LOW_SLIPPAGE_BPS_THRESHOLD {
        confidence += LARGE_LOW_SLIPPAGE_CONFIDENCE;
    }
    confidence = confidence.min(1.0);

    if confidence <= 0.0 {
        return Vec::new();
    }

    let estimated_loss_usd = amount_in_usd * ESTIMATED_LOSS_RATE;
    let severity = confidence * SEVERITY_SCALE;

    let risk_breakdown = risk_scoring::score(
        risk_scoring::ExecutionInputs {
            required_gas: victim.gas_limit,
            competing_bots: ctx.competing_bots_estimate,
        },
        risk_scoring::MarketInputs {
            volatility: ctx.returns.volatility(&decoded.token_in, 30),
        },
        severity,
    );

    let detected_at = ctx.clock.now_ns();
    let opportunity = Opportunity {
        id: format!("sandwich_{}", victim.hash),
        opportunity_type: OpportunityType::Sandwich,
        confidence_tier: ConfidenceTier::from_score(confidence),
        confidence_score: confidence,
        estimated_profit_usd: estimated_loss_usd,
        required_gas: victim.gas_limit,
        optimal_gas_price: victim.gas_price_wei,
        execution_deadline_blocks: DEFAULT_DEADLINE_BLOCKS,
        detected_at,
        // Sandwich windows are short-lived: expire after the configured
        // window's worth of blocks, approximated at 12s/block.
        expires_at: detected_at + u64::from(ctx.config.sandwich_window_blocks) * 12_000_000_000,
        involved_tx_hashes: suspicious.iter().map(|t| t.hash.clone()).collect(),
        victim_tx: Some(victim.hash.clone()),
        sandwich_details: Some(SandwichDetails {
            // The original engine never populates these; left as an
            // explicit future-correctness gap per the source's own
            // unused fields rather than fabricated here.
            frontrun_tx: None,
            backrun_tx: None,
            victim_tx: victim.hash.clone(),
            estimated_loss_usd,
            suspicious_transactions: suspicious.iter().map(|t| t.hash.clone()).collect(),
        }),
        arbitrage_path: None,
        risk_breakdown,
    };

    vec![opportunity]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::DetectionConfig;
    use crate::mempool::MempoolSnapshot;
    use crate::pool_store::{PoolStore, PriceStore};
    use crate::returns::HistoricalReturns;
    use crate::types::DecodedSwap;

    fn swap_tx(hash: &str, gas_price_wei: u64, token_in: &str, token_out: &str, amount_in: Decimal, slippage_bps: u32) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: "0xfrom".to_string(),
            to: "0xrouter".to_string(),
            value: dec!(0),
            gas_limit: 180_000,
            gas_price_wei,
            data_blob: vec![0xaa, 0xbb, 0xcc, 0xdd],
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: Some(DecodedSwap {
                token_in: token_in.to_string(),
                token_out: token_out.to_string(),
                amount_in,
                amount_out_min: dec!(0),
                pool_address: "0xpool".to_string(),
                slippage_bps,
            }),
        }
    }

    #[test]
    fn scenario_one_sandwich_detection() {
        // §8 scenario 1: victim swaps 200_000 USDC -> WETH at 30 bps slippage,
        // gas 50 gwei (scaled as wei here for simplicity since only relative
        // ordering matters); mempool has tx A (opposite direction, higher gas)
        // and tx B (same direction, lower gas).
        let victim = swap_tx("victim", 50, "USDC", "WETH", dec!(200_000), 30);
        let tx_a = swap_tx("tx_a", 60, "WETH", "USDC", dec!(50_000), 30);
        let tx_b = swap_tx("tx_b", 40, "USDC", "WETH", dec!(10_000), 30);

        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        prices.upsert_price(crate::types::Price {
            token: "USDC".to_string(),
            usd_price: dec!(1),
            per_dex_prices: Default::default(),
            volatility: 0.0,
            last_updated_ns: 1,
        });
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(100);
        mempool.admit(tx_a);
        mempool.admit(tx_b);
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

        let found = detect(&victim, &ctx);
        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert!(opp.confidence_score >= 0.7);
        assert_eq!(opp.confidence_tier, ConfidenceTier::High);
        assert_eq!(opp.estimated_profit_usd, dec!(400));
        let details = opp.sandwich_details.as_ref().unwrap();
        assert_eq!(details.suspicious_transactions, vec!["tx_a".to_string()]);
    }

    #[test]
    fn no_signal_yields_no_opportunity() {
        let victim = swap_tx("victim", 50, "USDC", "WETH", dec!(100), 200);
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

        assert!(detect(&victim, &ctx).is_empty());
    }
}
