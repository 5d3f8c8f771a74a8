//! Position Ledger - cost basis and realized P&L per symbol
//!
//! Simplified long-only model: selling past flat floors the position at
//! zero instead of going short. Unrealized P&L is derived against a
//! reference price on demand and never stored.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{ReferencePrices, Side, Symbol};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionChange {
    pub timestamp: DateTime<Utc>,
    pub action: Side,
    pub qty: u64,
    pub price: f64,
    pub quantity_after: u64,
    pub avg_price_after: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: u64,
    pub avg_price: f64,
    pub cost_basis: f64,
    pub realized_pnl: f64,
    pub last_updated: DateTime<Utc>,
    pub history: Vec<PositionChange>,
}

impl Position {
    fn flat(symbol: Symbol, now: DateTime<Utc>) -> Self {
        Self {
            symbol,
            quantity: 0,
            avg_price: 0.0,
            cost_basis: 0.0,
            realized_pnl: 0.0,
            last_updated: now,
            history: Vec::new(),
        }
    }

    pub fn market_value(&self, reference: f64) -> f64 {
        self.quantity as f64 * reference
    }

    pub fn unrealized_pnl(&self, reference: f64) -> f64 {
        self.market_value(reference) - self.cost_basis
    }
}

/// Aggregate portfolio risk view derived from live positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_exposure: f64,
    /// Largest position as a percentage of total exposure
    pub position_concentration: f64,
    pub daily_pnl: f64,
    pub var_95: f64,
}

pub struct PositionLedger {
    inner: Mutex<HashMap<Symbol, Position>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one execution to the symbol's position. Returns the updated
    /// position and the realized P&L delta of this fill (zero for buys).
    pub fn apply_fill(
        &self,
        symbol: &Symbol,
        side: Side,
        qty: u64,
        price: f64,
    ) -> (Position, f64) {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let pos = inner
            .entry(symbol.clone())
            .or_insert_with(|| Position::flat(symbol.clone(), now));

        let mut realized = 0.0;
        match side {
            Side::Buy => {
                let new_qty = pos.quantity + qty;
                let new_cost = pos.cost_basis + qty as f64 * price;
                pos.quantity = new_qty;
                pos.cost_basis = new_cost;
                pos.avg_price = if new_qty > 0 {
                    new_cost / new_qty as f64
                } else {
                    0.0
                };
            }
            Side::Sell => {
                if pos.quantity > 0 {
                    // proportional cost allocation for the reduced portion
                    let sold_cost =
                        (qty as f64 / pos.quantity as f64) * pos.cost_basis;
                    realized = qty as f64 * price - sold_cost;
                    pos.realized_pnl += realized;

                    let new_qty = pos.quantity.saturating_sub(qty);
                    pos.quantity = new_qty;
                    pos.cost_basis = (pos.cost_basis - sold_cost).max(0.0);
                    pos.avg_price = if new_qty > 0 {
                        pos.cost_basis / new_qty as f64
                    } else {
                        0.0
                    };
                }
            }
        }

        pos.last_updated = now;
        pos.history.push(PositionChange {
            timestamp: now,
            action: side,
            qty,
            price,
            quantity_after: pos.quantity,
            avg_price_after: pos.avg_price,
        });

        (pos.clone(), realized)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Position> {
        self.inner.lock().get(symbol).cloned()
    }

    pub fn list(&self) -> Vec<Position> {
        self.inner.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn risk_metrics(&self, refs: &dyn ReferencePrices) -> RiskMetrics {
        let inner = self.inner.lock();
        let mut total_exposure = 0.0;
        let mut max_position = 0.0_f64;
        let mut daily_pnl = 0.0;
        for pos in inner.values() {
            let reference = refs.last_trade(&pos.symbol).unwrap_or(pos.avg_price);
            let value = pos.market_value(reference);
            total_exposure += value;
            max_position = max_position.max(value);
            daily_pnl += pos.realized_pnl + pos.unrealized_pnl(reference);
        }
        RiskMetrics {
            total_exposure,
            position_concentration: if total_exposure > 0.0 {
                max_position / total_exposure * 100.0
            } else {
                0.0
            },
            daily_pnl,
            var_95: total_exposure * 0.02,
        }
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::SimReferencePrices;

    #[test]
    fn buys_accumulate_weighted_cost() {
        let ledger = PositionLedger::new();
        let sym = Symbol::new("AAPL");
        ledger.apply_fill(&sym, Side::Buy, 10, 100.0);
        let (pos, realized) = ledger.apply_fill(&sym, Side::Buy, 10, 110.0);
        assert_eq!(realized, 0.0);
        assert_eq!(pos.quantity, 20);
        assert!((pos.avg_price - 105.0).abs() < 1e-9);
        assert!((pos.cost_basis - 2_100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_sell_realizes_proportional_pnl() {
        let ledger = PositionLedger::new();
        let sym = Symbol::new("AAPL");
        ledger.apply_fill(&sym, Side::Buy, 10, 100.0);

        let (pos, realized) = ledger.apply_fill(&sym, Side::Sell, 5, 120.0);
        // 5 * 120 - 5 * 100
        assert!((realized - 100.0).abs() < 1e-9);
        assert_eq!(pos.quantity, 5);
        assert!((pos.cost_basis - 500.0).abs() < 1e-9);
        assert!((pos.avg_price - 100.0).abs() < 1e-9);
        assert!((pos.realized_pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn oversell_floors_at_zero() {
        let ledger = PositionLedger::new();
        let sym = Symbol::new("AAPL");
        ledger.apply_fill(&sym, Side::Buy, 10, 100.0);
        let (pos, _) = ledger.apply_fill(&sym, Side::Sell, 25, 100.0);
        assert_eq!(pos.quantity, 0);
        assert_eq!(pos.cost_basis, 0.0);
        assert_eq!(pos.avg_price, 0.0);
    }

    #[test]
    fn sell_with_no_position_changes_nothing() {
        let ledger = PositionLedger::new();
        let sym = Symbol::new("AAPL");
        let (pos, realized) = ledger.apply_fill(&sym, Side::Sell, 5, 100.0);
        assert_eq!(realized, 0.0);
        assert_eq!(pos.quantity, 0);
        assert_eq!(pos.history.len(), 1);
    }

    #[test]
    fn history_records_every_change() {
        let ledger = PositionLedger::new();
        let sym = Symbol::new("AAPL");
        ledger.apply_fill(&sym, Side::Buy, 10, 100.0);
        let (pos, _) = ledger.apply_fill(&sym, Side::Sell, 4, 105.0);
        assert_eq!(pos.history.len(), 2);
        assert_eq!(pos.history[1].quantity_after, 6);
    }

    #[test]
    fn risk_metrics_report_concentration() {
        let ledger = PositionLedger::new();
        let refs = SimReferencePrices::default();
        ledger.apply_fill(&Symbol::new("AAPL"), Side::Buy, 30, 100.0);
        ledger.apply_fill(&Symbol::new("MSFT"), Side::Buy, 10, 100.0);

        let metrics = ledger.risk_metrics(&refs);
        assert!((metrics.total_exposure - 4_000.0).abs() < 1e-9);
        assert!((metrics.position_concentration - 75.0).abs() < 1e-9);
        assert!((metrics.var_95 - 80.0).abs() < 1e-9);
    }
}
