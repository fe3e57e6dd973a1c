//! Risk scoring of an opportunity (§4.4.7).
//!
//! `overall` is a weighted blend of execution, market, and competition risk;
//! `gas` is carried alongside as an informational factor (part of the data
//! model's `risk_breakdown`) but is not itself weighted into `overall`.

use crate::types::RiskBreakdown;

const EXECUTION_WEIGHT: f64 = 0.5;
const MARKET_WEIGHT: f64 = 0.3;
const COMPETITION_WEIGHT: f64 = 0.2;

pub struct ExecutionInputs {
    pub required_gas: u64,
    pub competing_bots: u32,
}

pub struct MarketInputs {
    /// Realized volatility of the token(s) involved, from the Historical
    /// Returns component (C4).
    pub volatility: f64,
}

/// Computes the full risk breakdown for an opportunity. `severity_hint` lets
/// a detector (e.g. sandwich) fold its own severity signal into the market
/// factor, since sandwich severity is itself a market-impact measure.
pub fn score(execution: ExecutionInputs, market: MarketInputs, severity_hint: f64) -> RiskBreakdown {
    let execution_risk =
        (1.0_f64.min(execution.required_gas as f64 / 1_000_000.0 + execution.competing_bots as f64 / 100.0)) / 2.0;

    let market_risk = (market.volatility.max(severity_hint)).clamp(0.0, 1.0);

    let competition_risk = (execution.competing_bots as f64 / 50.0).clamp(0.0, 1.0);

    let gas_risk = (execution.required_gas as f64 / 1_000_000.0).clamp(0.0, 1.0);

    let overall =
        EXECUTION_WEIGHT * execution_risk + MARKET_WEIGHT * market_risk + COMPETITION_WEIGHT * competition_risk;

    RiskBreakdown {
        execution: execution_risk,
        market: market_risk,
        competition: competition_risk,
        gas: gas_risk,
        overall: overall.clamp(0.0, 1.0),
    }
}
