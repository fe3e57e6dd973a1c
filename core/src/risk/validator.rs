//! Trade Validator (C12, §4.7 pre-trade validation).
//!
//! Runs a fixed sequence of checks against a proposed trade before it is
//! allowed to execute. The first failing check wins — validation is a gate,
//! not a scorer, so callers get one `RiskAlert` naming exactly what blocked
//! the trade rather than an aggregate score to interpret themselves. Order
//! follows §4.7: global emergency stop, paused/blacklisted symbol, single
//! trade ceiling, position size ceiling, portfolio value ceiling, any
//! tripped breaker.

use std::collections::HashSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::breaker::CircuitBreakerArray;
use super::position::PositionMap;
use crate::config::RiskLimitsConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{AlertLevel, RiskAlert};

/// §6 `validate_trade(symbol, quantity, price) -> bool`: a proposed trade
/// named by the quantity/price the caller actually intends to transact, not
/// a pre-collapsed notional figure the caller could fabricate without a real
/// order.
#[derive(Debug, Clone)]
pub struct TradeProposal {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub portfolio_value_usd: Decimal,
}

impl TradeProposal {
    pub fn notional_usd(&self) -> Decimal {
        (self.quantity * self.price).abs()
    }
}

pub enum Validation {
    Approved,
    Denied(RiskAlert),
}

impl Validation {
    pub fn is_approved(&self) -> bool {
        matches!(self, Validation::Approved)
    }
}

fn denied(alert_type: &str, level: AlertLevel, description: String, symbol: &str, now_ns: u64) -> Validation {
    Validation::Denied(RiskAlert {
        alert_type: alert_type.to_string(),
        level,
        description,
        symbol: Some(symbol.to_string()),
        raised_at: now_ns,
    })
}

/// Evaluates `proposal` against the full §4.7 denial list, in order:
/// malformed input, emergency stop, paused/blacklisted symbol, single-trade
/// ceiling, position-size ceiling (absolute and percent of portfolio),
/// portfolio value ceiling, and whether any circuit breaker is currently
/// tripped.
#[allow(clippy::too_many_arguments)]
pub fn validate_trade(
    proposal: &TradeProposal,
    limits: &RiskLimitsConfig,
    positions: &PositionMap,
    breakers: &CircuitBreakerArray,
    emergency_stop: bool,
    paused_symbols: &HashSet<String>,
    now_ns: u64,
) -> CoreResult<Validation> {
    if proposal.quantity <= Decimal::ZERO || proposal.price <= Decimal::ZERO {
        return Err(CoreError::InputInvalid(format!(
            "trade proposal for {} must have a positive quantity and price, got quantity={} price={}",
            proposal.symbol, proposal.quantity, proposal.price
        )));
    }

    let notional_usd = proposal.notional_usd();

    if emergency_stop || breakers.any_requires_emergency_liquidation() {
        return Ok(denied(
            "EMERGENCY_HALT",
            AlertLevel::Emergency,
            "global emergency stop is active".to_string(),
            &proposal.symbol,
            now_ns,
        ));
    }

    if paused_symbols.contains(&proposal.symbol) {
        return Ok(denied(
            "SYMBOL_PAUSED",
            AlertLevel::Moderate,
            format!("{} is currently paused for trading", proposal.symbol),
            &proposal.symbol,
            now_ns,
        ));
    }

    if limits.blacklisted_symbols.iter().any(|s| s == &proposal.symbol) {
        return Ok(denied(
            "SYMBOL_BLACKLISTED",
            AlertLevel::High,
            format!("{} is blacklisted for trading", proposal.symbol),
            &proposal.symbol,
            now_ns,
        ));
    }

    if notional_usd > limits.max_single_trade_usd {
        return Ok(denied(
            "TRADE_SIZE_EXCEEDED",
            AlertLevel::High,
            format!(
                "trade notional {} exceeds max_single_trade_usd {}",
                notional_usd, limits.max_single_trade_usd
            ),
            &proposal.symbol,
            now_ns,
        ));
    }

    let existing = positions
        .get(&proposal.symbol)
        .map(|p| p.market_value().abs())
        .unwrap_or(Decimal::ZERO);
    let projected = existing + notional_usd;

    if projected > limits.max_position_size_usd {
        return Ok(denied(
            "POSITION_SIZE_EXCEEDED",
            AlertLevel::High,
            format!(
                "projected position {} exceeds max_position_size_usd {}",
                projected, limits.max_position_size_usd
            ),
            &proposal.symbol,
            now_ns,
        ));
    }

    if proposal.portfolio_value_usd > Decimal::ZERO {
        let pct = (projected / proposal.portfolio_value_usd * Decimal::from(100))
            .to_f64()
            .unwrap_or(0.0);
        if pct > limits.max_position_size_pct {
            return Ok(denied(
                "POSITION_CONCENTRATION_EXCEEDED",
                AlertLevel::Moderate,
                format!(
                    "projected position is {:.2}% of portfolio, exceeding max_position_size_pct {}",
                    pct, limits.max_position_size_pct
                ),
                &proposal.symbol,
                now_ns,
            ));
        }
    }

    if proposal.portfolio_value_usd + notional_usd > limits.max_portfolio_value {
        return Ok(denied(
            "PORTFOLIO_VALUE_EXCEEDED",
            AlertLevel::Critical,
            format!(
                "portfolio value {} plus trade {} exceeds max_portfolio_value {}",
                proposal.portfolio_value_usd, notional_usd, limits.max_portfolio_value
            ),
            &proposal.symbol,
            now_ns,
        ));
    }

    if breakers.any_tripped() {
        return Ok(denied(
            "BREAKER_TRIPPED",
            AlertLevel::Critical,
            "a circuit breaker is currently tripped".to_string(),
            &proposal.symbol,
            now_ns,
        ));
    }

    Ok(Validation::Approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::breaker::{BreakerType, CircuitBreakerArray};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn limits() -> RiskLimitsConfig {
        RiskLimitsConfig::default()
    }

    fn empty_breakers() -> CircuitBreakerArray {
        CircuitBreakerArray::new(vec![]).unwrap()
    }

    fn no_pauses() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn approves_trade_within_limits() {
        let positions = PositionMap::new();
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1_000),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        let result = validate_trade(&proposal, &limits(), &positions, &empty_breakers(), false, &no_pauses(), 0).unwrap();
        assert!(result.is_approved());
    }

    #[test]
    fn rejects_non_positive_quantity_or_price() {
        let positions = PositionMap::new();
        let zero_quantity = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(0),
            price: dec!(2000),
            portfolio_value_usd: dec!(1_000_000),
        };
        assert!(matches!(
            validate_trade(&zero_quantity, &limits(), &positions, &empty_breakers(), false, &no_pauses(), 0),
            Err(CoreError::InputInvalid(_))
        ));

        let negative_price = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(-1),
            portfolio_value_usd: dec!(1_000_000),
        };
        assert!(matches!(
            validate_trade(&negative_price, &limits(), &positions, &empty_breakers(), false, &no_pauses(), 0),
            Err(CoreError::InputInvalid(_))
        ));
    }

    #[test]
    fn denies_trade_exceeding_single_trade_ceiling() {
        let positions = PositionMap::new();
        let mut l = limits();
        l.max_single_trade_usd = dec!(1_000);
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(5_000),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &l, &positions, &empty_breakers(), false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "TRADE_SIZE_EXCEEDED"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn denies_blacklisted_symbol() {
        let positions = PositionMap::new();
        let mut l = limits();
        l.blacklisted_symbols = vec!["SCAM".to_string()];
        let proposal = TradeProposal {
            symbol: "SCAM".to_string(),
            quantity: dec!(100),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &l, &positions, &empty_breakers(), false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "SYMBOL_BLACKLISTED"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn denies_paused_symbol() {
        let positions = PositionMap::new();
        let mut paused = HashSet::new();
        paused.insert("ETH".to_string());
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(100),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &limits(), &positions, &empty_breakers(), false, &paused, 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "SYMBOL_PAUSED"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn denies_when_global_emergency_stop_set() {
        let positions = PositionMap::new();
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &limits(), &positions, &empty_breakers(), true, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "EMERGENCY_HALT"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn denies_when_portfolio_value_ceiling_exceeded() {
        let positions = PositionMap::new();
        let mut l = limits();
        l.max_portfolio_value = dec!(1_000_000);
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(50_000),
            price: dec!(1),
            portfolio_value_usd: dec!(990_000),
        };
        match validate_trade(&proposal, &l, &positions, &empty_breakers(), false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "PORTFOLIO_VALUE_EXCEEDED"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn denies_when_any_breaker_tripped_even_without_emergency_liquidation() {
        let positions = PositionMap::new();
        let mut breakers = CircuitBreakerArray::new(vec![(
            BreakerType::Volatility,
            crate::config::BreakerConfig {
                trigger_threshold: 0.1,
                reset_threshold: 0.05,
                timeout_duration: Duration::from_secs(60),
                auto_reset: true,
                max_triggers_per_day: 3,
                emergency_liquidation: false,
            },
        )])
        .unwrap();
        breakers.observe(BreakerType::Volatility, 0.2, 0);

        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &limits(), &positions, &breakers, false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "BREAKER_TRIPPED"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn emergency_breaker_overrides_everything() {
        let positions = PositionMap::new();
        let mut breakers = CircuitBreakerArray::new(vec![(
            BreakerType::PortfolioDrawdown,
            crate::config::BreakerConfig {
                trigger_threshold: 0.1,
                reset_threshold: 0.05,
                timeout_duration: Duration::from_secs(60),
                auto_reset: true,
                max_triggers_per_day: 3,
                emergency_liquidation: true,
            },
        )])
        .unwrap();
        breakers.observe(BreakerType::PortfolioDrawdown, 0.2, 0);

        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(1),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &limits(), &positions, &breakers, false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => assert_eq!(alert.alert_type, "EMERGENCY_HALT"),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn scenario_five_trade_size_denial() {
        // A trade sized past the configured ceiling is denied with the
        // TRADE_SIZE_EXCEEDED alert code.
        let positions = PositionMap::new();
        let mut l = limits();
        l.max_single_trade_usd = dec!(100_000);
        let proposal = TradeProposal {
            symbol: "ETH".to_string(),
            quantity: dec!(250_000),
            price: dec!(1),
            portfolio_value_usd: dec!(1_000_000),
        };
        match validate_trade(&proposal, &l, &positions, &empty_breakers(), false, &no_pauses(), 0).unwrap() {
            Validation::Denied(alert) => {
                assert_eq!(alert.alert_type, "TRADE_SIZE_EXCEEDED");
                assert_eq!(alert.level, AlertLevel::High);
            }
            _ => panic!("expected denial"),
        }
    }
}
