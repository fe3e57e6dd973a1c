//! Risk metrics recomputation (§4.7 "Metrics recomputation").
//!
//! Derives a point-in-time `RiskMetrics` snapshot from the active position
//! map and the portfolio-level P&L return series. VaR/CVaR are only
//! meaningful with enough history, so they stay at zero below the sample
//! floor rather than reporting a number an empty tail can't support.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::{Position, PositionMap};
use crate::returns::{self, HistoricalReturns};

/// VaR/CVaR are reported only once the portfolio return series has at least
/// this many samples; below it the empirical tail is too thin to trust.
pub const MIN_SAMPLES_FOR_TAIL_RISK: usize = 10;

pub const PORTFOLIO_SYMBOL: &str = "__portfolio__";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RiskMetrics {
    pub total_exposure_usd: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub position_count: usize,
    pub largest_position_pct: f64,
    pub concentration_pct: f64,
    pub leverage_ratio: f64,
    pub portfolio_var_95: f64,
    pub portfolio_cvar_95: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
}

/// Recomputes the full metrics snapshot from the current position set and
/// the trailing `equity_curve` (portfolio equity observations, oldest
/// first), feeding the latest observation into `returns` as a side effect.
pub fn recompute(
    positions: &PositionMap,
    returns: &HistoricalReturns,
    equity_curve: &[f64],
    portfolio_value_usd: Decimal,
) -> RiskMetrics {
    let all: Vec<Position> = positions.all();
    let total_exposure_usd: Decimal = all.iter().map(|p| p.market_value().abs()).sum();
    let total_unrealized_pnl: Decimal = all.iter().map(|p| p.unrealized_pnl()).sum();
    let total_realized_pnl = positions.realized_pnl_total();

    let largest = all
        .iter()
        .map(|p| p.market_value().abs())
        .fold(Decimal::ZERO, Decimal::max);

    let largest_position_pct = ratio_pct(largest, portfolio_value_usd);
    let concentration_pct = herfindahl_concentration_pct(&all, portfolio_value_usd);
    let leverage_ratio = ratio(total_exposure_usd, portfolio_value_usd);

    if let Some(&latest) = equity_curve.last() {
        returns.record_value(PORTFOLIO_SYMBOL, latest);
    }
    let sample_count = returns.len(PORTFOLIO_SYMBOL);

    let (var_95, cvar_95) = if sample_count >= MIN_SAMPLES_FOR_TAIL_RISK {
        (
            returns.var(PORTFOLIO_SYMBOL, 0.95, returns::DEFAULT_HISTORY_CAP),
            returns.cvar(PORTFOLIO_SYMBOL, 0.95, returns::DEFAULT_HISTORY_CAP),
        )
    } else {
        (0.0, 0.0)
    };

    let sharpe_ratio = sharpe(equity_curve);
    let sortino_ratio = sortino(equity_curve);
    let max_drawdown_pct = max_drawdown_pct(equity_curve);

    RiskMetrics {
        total_exposure_usd,
        total_unrealized_pnl,
        total_realized_pnl,
        position_count: all.len(),
        largest_position_pct,
        concentration_pct,
        leverage_ratio,
        portfolio_var_95: var_95,
        portfolio_cvar_95: cvar_95,
        sharpe_ratio,
        sortino_ratio,
        max_drawdown_pct,
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator == Decimal::ZERO {
        return 0.0;
    }
    (numerator / denominator).to_f64().unwrap_or(0.0)
}

fn ratio_pct(numerator: Decimal, denominator: Decimal) -> f64 {
    ratio(numerator, denominator) * 100.0
}

/// Herfindahl-style concentration: sum of squared position-value shares,
/// expressed as a percentage (100% == fully concentrated in one position).
fn herfindahl_concentration_pct(positions: &[Position], portfolio_value_usd: Decimal) -> f64 {
    if portfolio_value_usd == Decimal::ZERO {
        return 0.0;
    }
    positions
        .iter()
        .map(|p| ratio(p.market_value().abs(), portfolio_value_usd).powi(2))
        .sum::<f64>()
        * 100.0
}

fn simple_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter_map(|w| if w[0] != 0.0 { Some((w[1] - w[0]) / w[0]) } else { None })
        .collect()
}

fn sharpe(equity_curve: &[f64]) -> f64 {
    let rets = simple_returns(equity_curve);
    let sd = returns::stdev(&rets);
    if sd == 0.0 {
        return 0.0;
    }
    returns::mean(&rets) / sd
}

fn sortino(equity_curve: &[f64]) -> f64 {
    let rets = simple_returns(equity_curve);
    if rets.is_empty() {
        return 0.0;
    }
    let downside: Vec<f64> = rets.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_dev = returns::stdev(&downside);
    if downside_dev == 0.0 {
        return 0.0;
    }
    returns::mean(&rets) / downside_dev
}

/// A hypothetical shock applied to current positions to see how the book
/// would look without waiting for it to actually happen (§4.7 stress
/// testing). `price_shocks` maps symbol -> multiplicative price factor
/// (e.g. 0.8 == a 20% drop); `market_shock` is applied to every symbol not
/// named explicitly.
#[derive(Debug, Clone, Default)]
pub struct StressTestScenario {
    pub name: String,
    pub price_shocks: std::collections::HashMap<String, f64>,
    pub market_shock: f64,
}

/// Pure re-evaluation of the position book under `scenario`: every position's
/// `last_price` is multiplied by its shock factor (or `market_shock` if
/// unnamed) and `recompute` is run against the resulting book, without
/// mutating any stored state. No Monte Carlo sampling; this is a single
/// deterministic what-if pass, matching the original engine's
/// `run_stress_test` contract minus its numerical-method machinery.
pub fn run_stress_test(
    positions: &PositionMap,
    returns: &HistoricalReturns,
    portfolio_value_usd: Decimal,
    scenario: &StressTestScenario,
) -> RiskMetrics {
    let shocked = PositionMap::new();
    for position in positions.all() {
        let factor = scenario
            .price_shocks
            .get(&position.symbol)
            .copied()
            .unwrap_or(scenario.market_shock);
        let factor_decimal = Decimal::from_f64_retain(factor).unwrap_or(Decimal::ONE);
        let shocked_price = position.last_price * factor_decimal;
        shocked.add_position(&position.symbol, position.quantity, position.avg_entry_price, position.entry_time);
        shocked.update_position(&position.symbol, shocked_price, position.last_update);
    }
    recompute(&shocked, returns, &[], portfolio_value_usd)
}

fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (peak - value) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst * 100.0
}
