//! Core types - strong typing for the order lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Error, Result};

/// Tradeable symbol (e.g. "AAPL")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
    TrailingStopLimit,
    Oco,
    Bracket,
}

impl OrderType {
    /// True for types that wait in the pending-conditional index until a
    /// reference-price trigger fires.
    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            OrderType::Stop
                | OrderType::StopLimit
                | OrderType::TrailingStop
                | OrderType::TrailingStopLimit
        )
    }

    /// True for container types that expand into child orders before routing.
    pub fn is_composite(self) -> bool {
        matches!(self, OrderType::Oco | OrderType::Bracket)
    }

    pub fn is_trailing(self) -> bool {
        matches!(self, OrderType::TrailingStop | OrderType::TrailingStopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Day,
    Ioc,
    Fok,
    Gtc,
    Gtd,
}

impl Default for TimeInForce {
    fn default() -> Self {
        TimeInForce::Day
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Partial,
    Filled,
    Rejected,
    Canceled,
    Triggered,
    StopPending,
}

impl OrderStatus {
    /// Terminal statuses freeze the order record: no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// One price level of an order book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: u64,
    pub venue: String,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time order book for a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub last_price: Option<f64>,
    pub volume: u64,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

/// Client order intake payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: u64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub trailing_percent: Option<f64>,
    pub trailing_amount: Option<f64>,
    #[serde(default)]
    pub tif: TimeInForce,
    pub gtd_date: Option<String>,
    pub profit_target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub parent_order_id: Option<OrderId>,
    pub linked_order_id: Option<OrderId>,
    pub notes: Option<String>,
}

fn positive(name: &str, value: Option<f64>) -> Result<()> {
    if let Some(v) = value
        && !(v.is_finite() && v > 0.0)
    {
        return Err(Error::Validation(format!("{name} must be positive")));
    }
    Ok(())
}

impl OrderRequest {
    /// Re-apply symbol normalization (trim + uppercase) on untrusted input.
    pub fn normalized(mut self) -> Self {
        self.symbol = Symbol::new(self.symbol.as_str());
        self
    }

    /// Field-level checks applied before anything touches the ledger.
    pub fn validate(&self) -> Result<()> {
        let len = self.symbol.as_str().len();
        if len == 0 || len > 10 {
            return Err(Error::Validation(
                "symbol must be 1..=10 characters".into(),
            ));
        }
        if self.qty == 0 {
            return Err(Error::Validation("qty must be greater than zero".into()));
        }
        positive("limit_price", self.limit_price)?;
        positive("stop_price", self.stop_price)?;
        positive("trailing_amount", self.trailing_amount)?;
        positive("profit_target", self.profit_target)?;
        positive("stop_loss", self.stop_loss)?;
        if let Some(pct) = self.trailing_percent
            && !(pct.is_finite() && pct > 0.0 && pct <= 100.0)
        {
            return Err(Error::Validation(
                "trailing_percent must be in (0, 100]".into(),
            ));
        }

        let missing = |what: &str| {
            Err(Error::Validation(format!(
                "{:?} order requires {what}",
                self.order_type
            )))
        };
        match self.order_type {
            OrderType::Market => {}
            OrderType::Limit if self.limit_price.is_none() => return missing("limit_price"),
            OrderType::Stop if self.stop_price.is_none() => return missing("stop_price"),
            OrderType::StopLimit if self.limit_price.is_none() || self.stop_price.is_none() => {
                return missing("limit_price and stop_price");
            }
            OrderType::TrailingStop | OrderType::TrailingStopLimit => {
                if self.stop_price.is_none() {
                    return missing("stop_price");
                }
                if self.trailing_percent.is_none() && self.trailing_amount.is_none() {
                    return missing("trailing_percent or trailing_amount");
                }
            }
            OrderType::Oco if self.limit_price.is_none() || self.stop_price.is_none() => {
                return missing("limit_price and stop_price");
            }
            OrderType::Bracket if self.profit_target.is_none() || self.stop_loss.is_none() => {
                return missing("profit_target and stop_loss");
            }
            _ => {}
        }
        Ok(())
    }
}

/// A single execution applied to an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub qty: u64,
    pub venue: String,
}

/// Authoritative order record, owned by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: u64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub trailing_percent: Option<f64>,
    pub trailing_amount: Option<f64>,
    pub tif: TimeInForce,
    pub gtd_date: Option<String>,
    pub profit_target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub parent_order_id: Option<OrderId>,
    pub linked_order_id: Option<OrderId>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub filled_qty: u64,
    pub leaves_qty: u64,
    pub avg_price: Option<f64>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub execution_log: Vec<Fill>,
    pub book_snapshots: Vec<BookSnapshot>,
}

impl Order {
    pub fn from_request(id: OrderId, req: OrderRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            symbol: req.symbol,
            side: req.side,
            order_type: req.order_type,
            qty: req.qty,
            limit_price: req.limit_price,
            stop_price: req.stop_price,
            trailing_percent: req.trailing_percent,
            trailing_amount: req.trailing_amount,
            tif: req.tif,
            gtd_date: req.gtd_date,
            profit_target: req.profit_target,
            stop_loss: req.stop_loss,
            parent_order_id: req.parent_order_id,
            linked_order_id: req.linked_order_id,
            notes: req.notes,
            status: OrderStatus::New,
            filled_qty: 0,
            leaves_qty: req.qty,
            avg_price: None,
            message: None,
            created_at: now,
            triggered_at: None,
            last_modified: now,
            execution_log: Vec::new(),
            book_snapshots: Vec::new(),
        }
    }
}

/// Asynchronous execution report from the venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub venue: String,
    pub price: f64,
    pub qty: u64,
    #[serde(rename = "final", default)]
    pub is_final: bool,
    pub status: OrderStatus,
    pub message: Option<String>,
    pub execution_time: DateTime<Utc>,
    pub order_book_snapshot: Option<BookSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market_request() -> OrderRequest {
        OrderRequest {
            symbol: Symbol::new("aapl "),
            side: Side::Buy,
            order_type: OrderType::Market,
            qty: 10,
            limit_price: None,
            stop_price: None,
            trailing_percent: None,
            trailing_amount: None,
            tif: TimeInForce::Day,
            gtd_date: None,
            profit_target: None,
            stop_loss: None,
            parent_order_id: None,
            linked_order_id: None,
            notes: None,
        }
    }

    #[test]
    fn symbol_is_normalized() {
        assert_eq!(Symbol::new(" msft ").as_str(), "MSFT");
    }

    #[test]
    fn market_order_validates() {
        assert!(market_request().validate().is_ok());
    }

    #[test]
    fn zero_qty_rejected() {
        let mut req = market_request();
        req.qty = 0;
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn limit_order_requires_price() {
        let mut req = market_request();
        req.order_type = OrderType::Limit;
        assert!(req.validate().is_err());
        req.limit_price = Some(101.5);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn trailing_stop_requires_trail() {
        let mut req = market_request();
        req.order_type = OrderType::TrailingStop;
        req.stop_price = Some(95.0);
        assert!(req.validate().is_err());
        req.trailing_percent = Some(2.5);
        assert!(req.validate().is_ok());
        req.trailing_percent = Some(150.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn status_terminality() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::StopPending.is_terminal());
        assert!(!OrderStatus::Partial.is_terminal());
    }

    #[test]
    fn wire_format_matches_venue_contract() {
        let report: ExecutionReport = serde_json::from_value(serde_json::json!({
            "order_id": OrderId::new(),
            "venue": "SIMX",
            "price": 100.5,
            "qty": 5,
            "final": true,
            "status": "FILLED",
            "execution_time": "2026-01-05T14:30:00Z",
        }))
        .unwrap();
        assert!(report.is_final);
        assert_eq!(report.status, OrderStatus::Filled);
    }
}
