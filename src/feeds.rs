//! Reference price feed - last-trade lookup for risk checks and triggers
//!
//! The market-data simulator is an external collaborator; this cache is the
//! seam it writes into. Unknown symbols fall back to a configurable default
//! so a cold simulator still produces a usable reference.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::core::{ReferencePrices, Symbol};

pub struct SimReferencePrices {
    prices: RwLock<HashMap<Symbol, f64>>,
    default_price: f64,
}

impl SimReferencePrices {
    pub fn new(default_price: f64) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            default_price,
        }
    }

    pub fn set(&self, symbol: Symbol, price: f64) {
        self.prices.write().insert(symbol, price);
    }
}

impl Default for SimReferencePrices {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl ReferencePrices for SimReferencePrices {
    fn last_trade(&self, symbol: &Symbol) -> Option<f64> {
        let price = self
            .prices
            .read()
            .get(symbol)
            .copied()
            .unwrap_or(self.default_price);
        (price > 0.0).then_some(price)
    }
}
