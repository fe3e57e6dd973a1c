//! Arbitrage detector (§4.4.3).
//!
//! Enumerates 2-hop round trips through the Pool Store: swap `token_in` for
//! an intermediate token in one pool, then swap the intermediate back to
//! `token_in` in a different pool quoting the same pair. A profitable round
//! trip (after `amm`'s constant-product math) yields an Arbitrage
//! opportunity at a fixed confidence of 0.75. Triangular loops over a hub
//! set are a straightforward generalization (swap through two intermediates
//! before returning to `token_in`) and are included for the configured hub
//! tokens.

use amm::{V2Math, V2PoolState};
use rust_decimal::Decimal;
use tracing::debug;

use super::risk_scoring;
use super::DetectionContext;
use crate::types::{
    ArbitrageHop, ArbitragePath, ConfidenceTier, Opportunity, OpportunityType, Pool, Transaction,
};

const ARBITRAGE_CONFIDENCE: f64 = 0.75;
const DEFAULT_DEADLINE_BLOCKS: u32 = 3;
const DEFAULT_REQUIRED_GAS: u64 = 250_000;
const DEFAULT_GAS_PRICE_WEI: u64 = 30;

/// Hub tokens considered as intermediates for triangular routing, beyond
/// whatever token the victim swap already touches.
const HUB_TOKENS: &[&str] = &["WETH", "USDC", "USDT", "DAI"];

fn other_token(pool: &Pool, token: &str) -> Option<String> {
    if pool.token_a == token {
        Some(pool.token_b.clone())
    } else if pool.token_b == token {
        Some(pool.token_a.clone())
    } else {
        None
    }
}

fn has_token(pool: &Pool, token: &str) -> bool {
    pool.token_a == token || pool.token_b == token
}

fn to_v2_state(pool: &Pool, token_in: &str, token_out: &str) -> Option<V2PoolState> {
    if pool.token_a == token_in && pool.token_b == token_out {
        Some(V2PoolState {
            reserve_in: pool.reserve_a,
            reserve_out: pool.reserve_b,
            fee_bps: pool.fee_bps,
        })
    } else if pool.token_b == token_in && pool.token_a == token_out {
        Some(V2PoolState {
            reserve_in: pool.reserve_b,
            reserve_out: pool.reserve_a,
            fee_bps: pool.fee_bps,
        })
    } else {
        None
    }
}

struct RoundTrip {
    pool_a: Pool,
    pool_b: Pool,
    intermediate: String,
    amount_out: Decimal,
}

/// A closed 3-hop loop `token_in -> hub_a -> hub_b -> token_in` over three
/// distinct pools, per §4.4.3's "triangular variant ... over a configured
/// hub set".
struct TriangularTrip {
    pool_a: Pool,
    pool_b: Pool,
    pool_c: Pool,
    hub_a: String,
    hub_b: String,
    amount_out: Decimal,
}

fn swap_through(pool: &Pool, token_in: &str, token_out: &str, amount: Decimal) -> Option<Decimal> {
    let state = to_v2_state(pool, token_in, token_out)?;
    V2Math::calculate_output_amount(amount, state.reserve_in, state.reserve_out, state.fee_bps).ok()
}

fn triangular_round_trips(token_in: &str, amount: Decimal, ctx: &DetectionContext) -> Vec<TriangularTrip> {
    let mut trips = Vec::new();

    for pool_a in ctx.pools.pools_for_token(token_in) {
        let Some(hub_a) = other_token(&pool_a, token_in) else {
            continue;
        };
        if !HUB_TOKENS.contains(&hub_a.as_str()) {
            continue;
        }
        let Some(amount_after_a) = swap_through(&pool_a, token_in, &hub_a, amount) else {
            continue;
        };

        for pool_b in ctx.pools.pools_for_token(&hub_a) {
            if pool_b.address == pool_a.address {
                continue;
            }
            let Some(hub_b) = other_token(&pool_b, &hub_a) else {
                continue;
            };
            if hub_b == token_in || !HUB_TOKENS.contains(&hub_b.as_str()) {
                continue;
            }
            let Some(amount_after_b) = swap_through(&pool_b, &hub_a, &hub_b, amount_after_a) else {
                continue;
            };

            for pool_c in ctx.pools.pools_for_token(&hub_b) {
                if pool_c.address == pool_a.address || pool_c.address == pool_b.address || !has_token(&pool_c, token_in) {
                    continue;
                }
                let Some(amount_out) = swap_through(&pool_c, &hub_b, token_in, amount_after_b) else {
                    continue;
                };

                if amount_out > amount {
                    trips.push(TriangularTrip {
                        pool_a: pool_a.clone(),
                        pool_b: pool_b.clone(),
                        pool_c: pool_c.clone(),
                        hub_a: hub_a.clone(),
                        hub_b: hub_b.clone(),
                        amount_out,
                    });
                }
            }
        }
    }

    trips
}

fn two_hop_round_trips(token_in: &str, amount: Decimal, ctx: &DetectionContext) -> Vec<RoundTrip> {
    let mut trips = Vec::new();

    for pool_a in ctx.pools.pools_for_token(token_in) {
        let Some(intermediate) = other_token(&pool_a, token_in) else {
            continue;
        };
        if !HUB_TOKENS.contains(&intermediate.as_str()) {
            continue;
        }
        let Some(v2_a) = to_v2_state(&pool_a, token_in, &intermediate) else {
            continue;
        };
        let Ok(amount_out_a) =
            V2Math::calculate_output_amount(amount, v2_a.reserve_in, v2_a.reserve_out, v2_a.fee_bps)
        else {
            continue;
        };

        for pool_b in ctx.pools.pools_for_token(&intermediate) {
            if pool_b.address == pool_a.address || !has_token(&pool_b, token_in) {
                continue;
            }
            let Some(v2_b) = to_v2_state(&pool_b, &intermediate, token_in) else {
                continue;
            };
            let Ok(amount_out_b) = V2Math::calculate_output_amount(
                amount_out_a,
                v2_b.reserve_in,
                v2_b.reserve_out,
                v2_b.fee_bps,
            ) else {
                continue;
            };

            if amount_out_b > amount {
                trips.push(RoundTrip {
                    pool_a: pool_a.clone(),
                    pool_b: pool_b.clone(),
                    intermediate: intermediate.clone(),
                    amount_out: amount_out_b,
                });
            }
        }
    }

    trips
}

pub fn detect(tx: &Transaction, ctx: &DetectionContext) -> Vec<Opportunity> {
    let Some(decoded) = tx.decoded.as_ref() else {
        return Vec::new();
    };

    let trips = two_hop_round_trips(&decoded.token_in, decoded.amount_in, ctx);
    let mut opportunities = Vec::new();

    for (idx, trip) in trips.into_iter().enumerate() {
        let profit_tokens = trip.amount_out - decoded.amount_in;
        let profit_usd = match ctx.usd_value(&decoded.token_in, profit_tokens) {
            Ok(v) => v,
            Err(e) => {
                debug!(token = %decoded.token_in, error = %e, "skipping arbitrage trip, no price data");
                continue;
            }
        };
        if profit_usd <= ctx.config.min_profit_usd {
            continue;
        }

        let risk_breakdown = risk_scoring::score(
            risk_scoring::ExecutionInputs {
                required_gas: DEFAULT_REQUIRED_GAS,
                competing_bots: ctx.competing_bots_estimate,
            },
            risk_scoring::MarketInputs {
                volatility: ctx.returns.volatility(&decoded.token_in, 30),
            },
            0.2,
        );

        let detected_at = ctx.clock.now_ns();
        opportunities.push(Opportunity {
            id: format!("arbitrage_{}_{}", tx.hash, idx),
            opportunity_type: OpportunityType::Arbitrage,
            confidence_tier: ConfidenceTier::from_score(ARBITRAGE_CONFIDENCE),
            confidence_score: ARBITRAGE_CONFIDENCE,
            estimated_profit_usd: profit_usd,
            required_gas: DEFAULT_REQUIRED_GAS,
            optimal_gas_price: DEFAULT_GAS_PRICE_WEI,
            execution_deadline_blocks: DEFAULT_DEADLINE_BLOCKS,
            detected_at,
            expires_at: detected_at
                + u64::from(ctx.config.arbitrage_window_blocks) * 12_000_000_000,
            involved_tx_hashes: vec![tx.hash.clone()],
            victim_tx: None,
            sandwich_details: None,
            arbitrage_path: Some(ArbitragePath {
                hops: vec![
                    ArbitrageHop {
                        pool_address: trip.pool_a.address.clone(),
                        token_in: decoded.token_in.clone(),
                        token_out: trip.intermediate.clone(),
                    },
                    ArbitrageHop {
                        pool_address: trip.pool_b.address.clone(),
                        token_in: trip.intermediate.clone(),
                        token_out: decoded.token_in.clone(),
                    },
                ],
                notional: decoded.amount_in,
                path_profit_usd: profit_usd,
            }),
            risk_breakdown,
        });
    }

    let triangular_trips = triangular_round_trips(&decoded.token_in, decoded.amount_in, ctx);
    for (idx, trip) in triangular_trips.into_iter().enumerate() {
        let profit_tokens = trip.amount_out - decoded.amount_in;
        let profit_usd = match ctx.usd_value(&decoded.token_in, profit_tokens) {
            Ok(v) => v,
            Err(e) => {
                debug!(token = %decoded.token_in, error = %e, "skipping triangular arbitrage trip, no price data");
                continue;
            }
        };
        if profit_usd <= ctx.config.min_profit_usd {
            continue;
        }

        let risk_breakdown = risk_scoring::score(
            risk_scoring::ExecutionInputs {
                required_gas: DEFAULT_REQUIRED_GAS,
                competing_bots: ctx.competing_bots_estimate,
            },
            risk_scoring::MarketInputs {
                volatility: ctx.returns.volatility(&decoded.token_in, 30),
            },
            0.2,
        );

        let detected_at = ctx.clock.now_ns();
        opportunities.push(Opportunity {
            id: format!("arbitrage_triangular_{}_{}", tx.hash, idx),
            opportunity_type: OpportunityType::Arbitrage,
            confidence_tier: ConfidenceTier::from_score(ARBITRAGE_CONFIDENCE),
            confidence_score: ARBITRAGE_CONFIDENCE,
            estimated_profit_usd: profit_usd,
            required_gas: DEFAULT_REQUIRED_GAS * 3 / 2,
            optimal_gas_price: DEFAULT_GAS_PRICE_WEI,
            execution_deadline_blocks: DEFAULT_DEADLINE_BLOCKS,
            detected_at,
            expires_at: detected_at
                + u64::from(ctx.config.arbitrage_window_blocks) * 12_000_000_000,
            involved_tx_hashes: vec![tx.hash.clone()],
            victim_tx: None,
            sandwich_details: None,
            arbitrage_path: Some(ArbitragePath {
                hops: vec![
                    ArbitrageHop {
                        pool_address: trip.pool_a.address.clone(),
                        token_in: decoded.token_in.clone(),
                        token_out: trip.hub_a.clone(),
                    },
                    ArbitrageHop {
                        pool_address: trip.pool_b.address.clone(),
                        token_in: trip.hub_a.clone(),
                        token_out: trip.hub_b.clone(),
                    },
                    ArbitrageHop {
                        pool_address: trip.pool_c.address.clone(),
                        token_in: trip.hub_b.clone(),
                        token_out: decoded.token_in.clone(),
                    },
                ],
                notional: decoded.amount_in,
                path_profit_usd: profit_usd,
            }),
            risk_breakdown,
        });
    }

    opportunities
}
