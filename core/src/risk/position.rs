//! Position model and mutation (part of C10).
//!
//! All mutations to a single symbol's position are serialized through the
//! map's per-symbol entry lock (`dashmap` shard lock), matching the
//! concurrency model's "within a single symbol, all mutations are
//! serialized" rule. Between unrelated symbols there is no ordering
//! guarantee, which is why this is a sharded map rather than one global
//! mutex.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRisk {
    pub var_contribution: Decimal,
    pub beta: f64,
    pub volatility: f64,
    pub max_observed_loss: Decimal,
}

impl Default for PositionRisk {
    fn default() -> Self {
        Self {
            var_contribution: Decimal::ZERO,
            beta: 0.0,
            volatility: 0.0,
            max_observed_loss: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub last_price: Decimal,
    pub realized_pnl: Decimal,
    pub entry_time: u64,
    pub last_update: u64,
    pub risk: PositionRisk,
}

impl Position {
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.last_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.quantity * (self.last_price - self.avg_entry_price)
    }
}

/// Accumulates realized P&L across every position's full-close lifetime,
/// independent of whichever positions happen to be open right now.
#[derive(Default)]
pub struct RealizedPnlAccumulator {
    total: parking_lot::Mutex<Decimal>,
}

impl RealizedPnlAccumulator {
    pub fn add(&self, amount: Decimal) {
        *self.total.lock() += amount;
    }

    pub fn total(&self) -> Decimal {
        *self.total.lock()
    }
}

/// Active positions, keyed by symbol. A symbol with `quantity == 0` is
/// removed rather than retained as a zeroed entry (§3 invariant).
#[derive(Default)]
pub struct PositionMap {
    positions: DashMap<String, Position>,
    realized: RealizedPnlAccumulator,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn all(&self) -> Vec<Position> {
        self.positions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn realized_pnl_total(&self) -> Decimal {
        self.realized.total()
    }

    /// Opens or extends a position. On a sign flip (the new trade crosses
    /// through zero and reverses direction), realized P&L is booked for the
    /// portion that closed out the prior side and a fresh average entry is
    /// established for the remainder.
    pub fn add_position(&self, symbol: &str, delta_qty: Decimal, price: Decimal, now_ns: u64) {
        let mut entry = self.positions.entry(symbol.to_string()).or_insert_with(|| Position {
            symbol: symbol.to_string(),
            quantity: Decimal::ZERO,
            avg_entry_price: price,
            last_price: price,
            realized_pnl: Decimal::ZERO,
            entry_time: now_ns,
            last_update: now_ns,
            risk: PositionRisk::default(),
        });

        let same_sign = entry.quantity == Decimal::ZERO
            || (entry.quantity > Decimal::ZERO) == (delta_qty > Decimal::ZERO);

        if same_sign {
            let new_qty = entry.quantity + delta_qty;
            if new_qty != Decimal::ZERO {
                entry.avg_entry_price =
                    (entry.quantity * entry.avg_entry_price + delta_qty * price) / new_qty;
            }
            entry.quantity = new_qty;
        } else {
            // Sign flip: close min(|qty|, |delta|) of the existing side at `price`.
            let closing_qty = entry.quantity.abs().min(delta_qty.abs());
            let realized = closing_qty * (price - entry.avg_entry_price) * entry.quantity.signum();
            self.realized.add(realized);
            entry.realized_pnl += realized;

            let new_qty = entry.quantity + delta_qty;
            entry.quantity = new_qty;
            if new_qty != Decimal::ZERO {
                entry.avg_entry_price = price;
            }
        }
        entry.last_price = price;
        entry.last_update = now_ns;

        if entry.quantity == Decimal::ZERO {
            drop(entry);
            self.positions.remove(symbol);
        }
    }

    pub fn update_position(&self, symbol: &str, new_price: Decimal, now_ns: u64) {
        if let Some(mut entry) = self.positions.get_mut(symbol) {
            entry.last_price = new_price;
            entry.last_update = now_ns;
        }
    }

    /// Fully closes `symbol` at `close_price`, booking realized P&L for the
    /// whole position and removing it from the active map.
    pub fn close_position(&self, symbol: &str, close_price: Decimal, now_ns: u64) -> Option<Decimal> {
        let Some((_, position)) = self.positions.remove(symbol) else {
            return None;
        };
        let realized = position.quantity * (close_price - position.avg_entry_price);
        self.realized.add(realized);
        let _ = now_ns;
        Some(realized)
    }

    /// Liquidates every open position at its current `last_price`, booking
    /// realized P&L and clearing the active map. Used by emergency
    /// liquidation (§4.7).
    pub fn liquidate_all(&self) -> Decimal {
        let mut total = Decimal::ZERO;
        let symbols: Vec<String> = self.positions.iter().map(|e| e.key().clone()).collect();
        for symbol in symbols {
            if let Some((_, position)) = self.positions.remove(&symbol) {
                let realized = position.quantity * (position.last_price - position.avg_entry_price);
                self.realized.add(realized);
                total += realized;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_then_close_nets_to_zero() {
        let map = PositionMap::new();
        map.add_position("ETH", dec!(10), dec!(2000), 1);
        assert!(map.get("ETH").is_some());
        let realized = map.close_position("ETH", dec!(2000), 2).unwrap();
        assert_eq!(realized, dec!(0));
        assert!(map.get("ETH").is_none());
    }

    #[test]
    fn weighted_average_entry_on_same_side_additions() {
        let map = PositionMap::new();
        map.add_position("ETH", dec!(10), dec!(2000), 1);
        map.add_position("ETH", dec!(10), dec!(2200), 1);
        let position = map.get("ETH").unwrap();
        assert_eq!(position.avg_entry_price, dec!(2100));
        assert_eq!(position.quantity, dec!(20));
    }

    #[test]
    fn sign_flip_books_realized_pnl_for_closed_portion() {
        let map = PositionMap::new();
        map.add_position("ETH", dec!(10), dec!(2000), 1);
        // Sell 15: closes the 10 long at $2100 (realized 10*100=1000), opens -5 short at $2100.
        map.add_position("ETH", dec!(-15), dec!(2100), 2);
        let position = map.get("ETH").unwrap();
        assert_eq!(position.quantity, dec!(-5));
        assert_eq!(map.realized_pnl_total(), dec!(1000));
    }

    #[test]
    fn zero_quantity_position_is_not_retained() {
        let map = PositionMap::new();
        map.add_position("ETH", dec!(10), dec!(2000), 1);
        map.add_position("ETH", dec!(-10), dec!(2100), 2);
        assert!(map.get("ETH").is_none());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn liquidate_all_clears_and_books_pnl() {
        let map = PositionMap::new();
        map.add_position("ETH", dec!(10), dec!(2000), 1);
        map.update_position("ETH", dec!(2100), 2);
        map.add_position("BTC", dec!(1), dec!(40000), 1);
        map.update_position("BTC", dec!(39000), 2);

        let total = map.liquidate_all();
        assert_eq!(total, dec!(1000) + dec!(-1000));
        assert!(map.is_empty());
    }
}
