//! Risk Manager (C10): the aggregate surface the rest of the core talks to.
//!
//! Owns the position book, the breaker array, and the rolling equity curve
//! used for metrics recomputation. `tick` is the one entrypoint the
//! scheduler calls periodically; everything else is request/response.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::breaker::{BreakerTransition, BreakerType, CircuitBreakerArray};
use super::metrics::{self, RiskMetrics};
use super::position::PositionMap;
use super::validator::{self, TradeProposal, Validation};
use crate::config::{default_breaker_configs, RiskLimitsConfig};
use crate::error::CoreResult;
use crate::returns::HistoricalReturns;
use crate::types::{AlertLevel, RiskAlert};

/// Bound on the in-memory equity curve kept for Sharpe/Sortino/drawdown.
const EQUITY_CURVE_CAP: usize = 2_048;

pub struct RiskManager {
    limits: RiskLimitsConfig,
    positions: PositionMap,
    returns: HistoricalReturns,
    breakers: RwLock<CircuitBreakerArray>,
    equity_curve: RwLock<Vec<f64>>,
    base_capital_usd: Decimal,
    emergency_stop: AtomicBool,
    paused_symbols: RwLock<HashSet<String>>,
}

impl RiskManager {
    /// Fails at construction, not at first trip, if the installed breaker
    /// set violates the hysteresis invariant (§4.6, §7 fatal-at-start case).
    pub fn new(limits: RiskLimitsConfig, base_capital_usd: Decimal) -> CoreResult<Self> {
        Ok(Self {
            limits,
            positions: PositionMap::new(),
            returns: HistoricalReturns::default(),
            breakers: RwLock::new(CircuitBreakerArray::new(default_breaker_configs())?),
            equity_curve: RwLock::new(Vec::new()),
            base_capital_usd,
            emergency_stop: AtomicBool::new(false),
            paused_symbols: RwLock::new(HashSet::new()),
        })
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub fn portfolio_value_usd(&self) -> Decimal {
        let unrealized: Decimal = self.positions.all().iter().map(|p| p.unrealized_pnl()).sum();
        self.base_capital_usd + self.positions.realized_pnl_total() + unrealized
    }

    pub fn validate_trade(&self, proposal: &TradeProposal, now_ns: u64) -> CoreResult<Validation> {
        validator::validate_trade(
            proposal,
            &self.limits,
            &self.positions,
            &self.breakers.read(),
            self.is_emergency_stopped(),
            &self.paused_symbols.read(),
            now_ns,
        )
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop.load(Ordering::SeqCst)
    }

    /// §6 `emergency_stop(reason)`: blocks all new trade admission until an
    /// explicit resume. Independent of shutdown.
    pub fn set_emergency_stop(&self, stopped: bool) {
        self.emergency_stop.store(stopped, Ordering::SeqCst);
    }

    pub fn is_paused(&self, symbol: &str) -> bool {
        self.paused_symbols.read().contains(symbol)
    }

    /// §6 `pause_symbol(sym)`.
    pub fn pause_symbol(&self, symbol: &str) {
        self.paused_symbols.write().insert(symbol.to_string());
    }

    /// §6 `resume_symbol(sym)`.
    pub fn resume_symbol(&self, symbol: &str) {
        self.paused_symbols.write().remove(symbol);
    }

    /// §4.7 "Emergency liquidation": sets the emergency-stop flag, books
    /// realized P&L for every open position at its current `last_price`,
    /// clears the active map, and returns the raised Emergency alert.
    /// Submitting the corresponding liquidation orders on-chain is the
    /// Protection Router's responsibility, not this method's.
    pub fn liquidate_all(&self, reason: &str, now_ns: u64) -> RiskAlert {
        self.set_emergency_stop(true);
        self.positions.liquidate_all();
        RiskAlert {
            alert_type: "EMERGENCY_LIQUIDATION".to_string(),
            level: AlertLevel::Emergency,
            description: format!("emergency liquidation triggered: {}", reason),
            symbol: None,
            raised_at: now_ns,
        }
    }

    /// Records a new equity observation, recomputes the metrics snapshot,
    /// feeds the drawdown and daily-loss figures into the breaker array, and
    /// returns any alert that should be raised for a freshly tripped
    /// breaker.
    pub fn tick(&self, now_ns: u64) -> (RiskMetrics, Vec<RiskAlert>) {
        let portfolio_value = self.portfolio_value_usd();
        let portfolio_value_f64 = portfolio_value.to_f64().unwrap_or(0.0);

        {
            let mut curve = self.equity_curve.write();
            if curve.len() == EQUITY_CURVE_CAP {
                curve.remove(0);
            }
            curve.push(portfolio_value_f64);
        }

        let curve_snapshot = self.equity_curve.read().clone();
        let risk_metrics = metrics::recompute(&self.positions, &self.returns, &curve_snapshot, portfolio_value);

        let mut alerts = Vec::new();
        let mut breakers = self.breakers.write();

        let drawdown_fraction = risk_metrics.max_drawdown_pct / 100.0;
        match breakers.observe(BreakerType::PortfolioDrawdown, drawdown_fraction, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::PortfolioDrawdown, drawdown_fraction, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::PortfolioDrawdown, drawdown_fraction, now_ns)),
            BreakerTransition::None => {}
        }

        let leverage = risk_metrics.leverage_ratio;
        match breakers.observe(BreakerType::Leverage, leverage, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::Leverage, leverage, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::Leverage, leverage, now_ns)),
            BreakerTransition::None => {}
        }

        let concentration_fraction = risk_metrics.concentration_pct / 100.0;
        match breakers.observe(BreakerType::Concentration, concentration_fraction, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::Concentration, concentration_fraction, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::Concentration, concentration_fraction, now_ns)),
            BreakerTransition::None => {}
        }

        let total_pnl = risk_metrics.total_realized_pnl + risk_metrics.total_unrealized_pnl;
        let daily_loss_fraction = if self.base_capital_usd > Decimal::ZERO {
            ((-total_pnl).max(Decimal::ZERO) / self.base_capital_usd).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };
        match breakers.observe(BreakerType::DailyLoss, daily_loss_fraction, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::DailyLoss, daily_loss_fraction, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::DailyLoss, daily_loss_fraction, now_ns)),
            BreakerTransition::None => {}
        }

        let position_size_fraction = risk_metrics.largest_position_pct / 100.0;
        match breakers.observe(BreakerType::PositionSize, position_size_fraction, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::PositionSize, position_size_fraction, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::PositionSize, position_size_fraction, now_ns)),
            BreakerTransition::None => {}
        }

        let volatility = self
            .positions
            .all()
            .iter()
            .map(|p| self.returns.volatility(&p.symbol, 30))
            .fold(0.0_f64, f64::max);
        match breakers.observe(BreakerType::Volatility, volatility, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::Volatility, volatility, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::Volatility, volatility, now_ns)),
            BreakerTransition::None => {}
        }

        let margin_usage = if self.limits.max_leverage_ratio > 0.0 {
            leverage / self.limits.max_leverage_ratio
        } else {
            0.0
        };
        match breakers.observe(BreakerType::MarginCall, margin_usage, now_ns) {
            BreakerTransition::Tripped => alerts.push(breaker_trip_alert(BreakerType::MarginCall, margin_usage, now_ns)),
            BreakerTransition::Reset => alerts.push(breaker_reset_alert(BreakerType::MarginCall, margin_usage, now_ns)),
            BreakerTransition::None => {}
        }

        if breakers.any_requires_emergency_liquidation() {
            alerts.push(self.liquidate_all("emergency-liquidation breaker tripped", now_ns));
        }

        (risk_metrics, alerts)
    }

    /// §4.7 stress testing: evaluates `scenario` against the live book
    /// without mutating any stored position or metrics state.
    pub fn run_stress_test(&self, scenario: &metrics::StressTestScenario) -> RiskMetrics {
        metrics::run_stress_test(&self.positions, &self.returns, self.portfolio_value_usd(), scenario)
    }

    /// §4.7 reporting helper: per-symbol share of total VaR contribution.
    pub fn get_risk_contributions(&self) -> Vec<(String, Decimal)> {
        let total: Decimal = self.positions.all().iter().map(|p| p.market_value().abs()).sum();
        if total == Decimal::ZERO {
            return Vec::new();
        }
        self.positions
            .all()
            .into_iter()
            .map(|p| {
                let share = p.market_value().abs() / total;
                (p.symbol, share)
            })
            .collect()
    }

    /// §4.7 reporting helper: the largest open positions by absolute notional.
    pub fn get_top_positions(&self, n: usize) -> Vec<super::position::Position> {
        let mut all = self.positions.all();
        all.sort_by(|a, b| b.market_value().abs().cmp(&a.market_value().abs()));
        all.truncate(n);
        all
    }

    pub fn tripped_breakers(&self) -> Vec<BreakerType> {
        self.breakers.read().tripped_types()
    }
}

fn breaker_trip_alert(breaker_type: BreakerType, value: f64, now_ns: u64) -> RiskAlert {
    RiskAlert {
        alert_type: format!("BREAKER_TRIPPED_{}", breaker_type.as_str().to_uppercase()),
        level: crate::types::AlertLevel::Critical,
        description: format!("{} breaker tripped at value {:.4}", breaker_type.as_str(), value),
        symbol: None,
        raised_at: now_ns,
    }
}

/// Matches §4.6's `CircuitBreakerCallback(type, false)` edge: the breaker
/// array resets to Armed. Informational, not a denial.
fn breaker_reset_alert(breaker_type: BreakerType, value: f64, now_ns: u64) -> RiskAlert {
    RiskAlert {
        alert_type: format!("BREAKER_RESET_{}", breaker_type.as_str().to_uppercase()),
        level: crate::types::AlertLevel::Low,
        description: format!("{} breaker reset to armed at value {:.4}", breaker_type.as_str(), value),
        symbol: None,
        raised_at: now_ns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_produces_metrics_with_no_positions() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        let (metrics, alerts) = manager.tick(1);
        assert_eq!(metrics.position_count, 0);
        assert!(alerts.is_empty());
    }

    #[test]
    fn drawdown_breaker_trips_and_liquidates_on_deep_loss() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.positions().add_position("ETH", dec!(100), dec!(2000), 1);
        manager.tick(1);

        // Crash ETH hard enough to blow past the 15% portfolio drawdown trigger.
        manager.positions().update_position("ETH", dec!(500), 2);
        let (_, alerts) = manager.tick(2);

        assert!(alerts.iter().any(|a| a.alert_type.starts_with("BREAKER_TRIPPED_PORTFOLIO_DRAWDOWN")));
        assert!(alerts.iter().any(|a| a.alert_type == "EMERGENCY_LIQUIDATION"));
        assert!(manager.positions().is_empty());
    }

    #[test]
    fn top_positions_orders_by_notional_descending() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.positions().add_position("ETH", dec!(10), dec!(2000), 1);
        manager.positions().add_position("BTC", dec!(1), dec!(40000), 1);
        let top = manager.get_top_positions(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].symbol, "BTC");
    }

    #[test]
    fn risk_contributions_sum_to_one() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.positions().add_position("ETH", dec!(10), dec!(2000), 1);
        manager.positions().add_position("BTC", dec!(1), dec!(20000), 1);
        let contributions = manager.get_risk_contributions();
        let total: Decimal = contributions.iter().map(|(_, share)| *share).sum();
        assert_eq!(total, dec!(1));
    }

    #[test]
    fn explicit_emergency_stop_blocks_trades() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.set_emergency_stop(true);
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(1),
            portfolio_value_usd: manager.portfolio_value_usd(),
        };
        match manager.validate_trade(&proposal, 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "EMERGENCY_HALT"),
            _ => panic!("expected denial"),
        }
        manager.set_emergency_stop(false);
        assert!(manager.validate_trade(&proposal, 0).unwrap().is_approved());
    }

    #[test]
    fn pause_and_resume_symbol_round_trips() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.pause_symbol("ETH");
        assert!(manager.is_paused("ETH"));
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(1),
            portfolio_value_usd: manager.portfolio_value_usd(),
        };
        match manager.validate_trade(&proposal, 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "SYMBOL_PAUSED"),
            _ => panic!("expected denial"),
        }
        manager.resume_symbol("ETH");
        assert!(!manager.is_paused("ETH"));
        assert!(manager.validate_trade(&proposal, 0).unwrap().is_approved());
    }

    #[test]
    fn liquidate_all_sets_emergency_stop_and_clears_positions() {
        let manager = RiskManager::new(RiskLimitsConfig::default(), dec!(1_000_000)).unwrap();
        manager.positions().add_position("ETH", dec!(10), dec!(2000), 1);
        let alert = manager.liquidate_all("manual operator trigger", 5);
        assert_eq!(alert.alert_type, "EMERGENCY_LIQUIDATION");
        assert_eq!(alert.level, AlertLevel::Emergency);
        assert!(manager.positions().is_empty());
        assert!(manager.is_emergency_stopped());
    }
}
