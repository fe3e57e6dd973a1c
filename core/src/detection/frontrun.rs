//! Frontrun detector (§4.4.2).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::risk_scoring;
use super::DetectionContext;
use crate::types::{ConfidenceTier, Opportunity, OpportunityType, Transaction};

const SAME_CALL_HIGHER_GAS_CONFIDENCE: f64 = 0.4;
const HIGH_VALUE_CONFIDENCE: f64 = 0.2;
const GAS_PRICE_MULTIPLIER: Decimal = dec!(1.1);
const HIGH_VALUE_USD_THRESHOLD: Decimal = dec!(50_000);
const SEVERITY_SCALE: f64 = 0.9;
const PROFIT_RATE: Decimal = dec!(0.01);
const DEFAULT_DEADLINE_BLOCKS: u32 = 1;

pub fn detect(victim: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
    let victim_selector = match victim.function_selector() {
        Some(s) => s,
        None => return Vec::new(),
    };
    let victim_gas_price = Decimal::from(victim.gas_price_wei);

    let competitors: Vec<Transaction> = ctx
        .mempool
        .snapshot()
        .into_iter()
        .filter(|candidate| {
            candidate.hash != victim.hash
                && candidate.to == victim.to
                && candidate.function_selector() == Some(victim_selector)
                && Decimal::from(candidate.gas_price_wei) >= victim_gas_price * GAS_PRICE_MULTIPLIER
        })
        .collect();

    if competitors.is_empty() {
        return Vec::new();
    }

    let mut confidence = SAME_CALL_HIGHER_GAS_CONFIDENCE;
    let victim_value_usd = victim.value * ctx.eth_price_usd;
    if victim_value_usd >= HIGH_VALUE_USD_THRESHOLD {
        confidence += HIGH_VALUE_CONFIDENCE;
    }
    confidence = confidence.min(1.0);

    let severity = confidence * SEVERITY_SCALE;
    let estimated_profit_usd = victim_value_usd * PROFIT_RATE;

    let risk_breakdown = risk_scoring::score(
        risk_scoring::ExecutionInputs {
            required_gas: victim.gas_limit,
            competing_bots: ctx.competing_bots_estimate,
        },
        risk_scoring::MarketInputs { volatility: 0.0 },
        severity,
    );

    let detected_at = ctx.clock.now_ns();
    let opportunity = Opportunity {
        id: format!("frontrun_{}", victim.hash),
        opportunity_type: OpportunityType::Frontrun,
        confidence_tier: ConfidenceTier::from_score(confidence),
        confidence_score: confidence,
        estimated_profit_usd,
        required_gas: victim.gas_limit,
        optimal_gas_price: victim.gas_price_wei,
        execution_deadline_blocks: DEFAULT_DEADLINE_BLOCKS,
        detected_at,
        expires_at: detected_at + 12_000_000_000,
        involved_tx_hashes: competitors.iter().map(|t| t.hash.clone()).collect(),
        victim_tx: Some(victim.hash.clone()),
        sandwich_details: None,
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

    fn call_tx(hash: &str, to: &str, gas_price_wei: u64, value: Decimal) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: "0xfrom".to_string(),
            to: to.to_string(),
            value,
            gas_limit: 100_000,
            gas_price_wei,
            data_blob: vec![0x11, 0x22, 0x33, 0x44],
            block_number: None,
            observed_at_ns: 1,
            mempool_position: None,
            decoded: None,
        }
    }

    fn ctx<'a>(
        clock: &'a Clock,
        pools: &'a PoolStore,
        prices: &'a PriceStore,
        returns: &'a HistoricalReturns,
        mempool: &'a MempoolSnapshot,
        config: &'a DetectionConfig,
    ) -> DetectionContext<'a> {
        DetectionContext {
            clock,
            pools,
            prices,
            returns,
            mempool,
            config,
            eth_price_usd: dec!(2000),
            competing_bots_estimate: 0,
        }
    }

    #[test]
    fn scenario_two_frontrun_detection() {
        let victim = call_tx("victim", "0xrouter", 50, dec!(1));
        let competitor = call_tx("competitor", "0xrouter", 60, dec!(1));

        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(100);
        mempool.admit(competitor);
        let config = DetectionConfig::default();
        let context = ctx(&clock, &pools, &prices, &returns, &mempool, &config);

        let found = detect(&victim, &context);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence_score, 0.4);
    }

    #[test]
    fn high_value_victim_adds_confidence() {
        let victim = call_tx("victim", "0xrouter", 50, dec!(37.5)); // 37.5 ETH * $2000 = $75,000
        let competitor = call_tx("competitor", "0xrouter", 60, dec!(1));

        let clock = Clock::for_test();
        let pools = PoolStore::new();
        let prices = PriceStore::new();
        let returns = HistoricalReturns::default();
        let mempool = MempoolSnapshot::new(100);
        mempool.admit(competitor);
        let config = DetectionConfig::default();
        prices.upsert_price(crate::types::Price {
            token: "ETH".to_string(),
            usd_price: dec!(2000),
            per_dex_prices: Default::default(),
            volatility: 0.0,
            last_updated_ns: 1,
        });
        let context = ctx(&clock, &pools, &prices, &returns, &mempool, &config);

        let found = detect(&victim, &context);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence_score, 0.6);
    }
}
