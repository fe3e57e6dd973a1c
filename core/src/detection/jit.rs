//! JIT liquidity detector (§4.4.5).
//!
//! Flags a large swap paired with a mempool `addLiquidity`/`removeLiquidity`
//! call targeting the same pool — the signature of a liquidity provider
//! sandwiching a large trade to capture fees without taking directional risk.

use rust_decimal_macros::dec;
use tracing::debug;

use super::risk_scoring;
use super::DetectionContext;
use crate::types::{ConfidenceTier, Opportunity, OpportunityType, Transaction};

const PER_MATCH_CONFIDENCE: f64 = 0.5;
const DEADLINE_BLOCKS: u32 = 1;

/// Selectors for `addLiquidity`/`removeLiquidity` family calls across the
/// common Uniswap-V2-style router ABI.
const LIQUIDITY_SELECTORS: &[[u8; 4]] = &[
    [0xe8, 0xe3, 0x37, 0x00], // addLiquidity(...)
    [0xba, 0xa2, 0xab, 0xde], // removeLiquidity(...)
];

pub fn detect(tx: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
    let Some(decoded) = tx.decoded.as_ref() else {
        return Vec::new();
    };

    let amount_in_usd = match ctx.usd_value(&decoded.token_in, decoded.amount_in) {
        Ok(v) => v,
        Err(e) => {
            debug!(token = %decoded.token_in, error = %e, "skipping JIT detection, no price data");
            return Vec::new();
        }
    };
    if amount_in_usd < dec!(50_000) {
        return Vec::new();
    }

    let matches: Vec<Transaction> = ctx
        .mempool
        .matching_pool(&decoded.pool_address)
        .into_iter()
        .filter(|candidate| {
            candidate.hash != tx.hash
                && candidate
                    .function_selector()
                    .is_some_and(|sel| LIQUIDITY_SELECTORS.contains(&sel))
        })
        .collect();

    if matches.is_empty() {
        return Vec::new();
    }

    let confidence = (matches.len() as f64 * PER_MATCH_CONFIDENCE).min(1.0);
    let risk_breakdown = risk_scoring::score(
        risk_scoring::ExecutionInputs {
            required_gas: tx.gas_limit,
            competing_bots: ctx.competing_bots_estimate,
        },
        risk_scoring::MarketInputs {
            volatility: ctx.returns.volatility(&decoded.token_in, 30),
        },
        0.3,
    );

    let detected_at = ctx.clock.now_ns();
    vec![Opportunity {
        id: format!("jit_{}", tx.hash),
        opportunity_type: OpportunityType::JitLiquidity,
        confidence_tier: ConfidenceTier::from_score(confidence),
        confidence_score: confidence,
        estimated_profit_usd: amount_in_usd * dec!(0.001),
        required_gas: tx.gas_limit,
        optimal_gas_price: tx.gas_price_wei,
        execution_deadline_blocks: DEADLINE_BLOCKS,
        detected_at,
        expires_at: detected_at + 12_000_000_000,
        involved_tx_hashes: matches.iter().map(|m| m.hash.clone()).collect(),
        victim_tx: Some(tx.hash.clone()),
        sandwich_details: None,
        arbitrage_path: None,
        risk_breakdown,
    }]
}
