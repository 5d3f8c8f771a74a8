//! Core traits - seams to the external collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::types::{Order, Symbol};

/// Execution venue - accepts routed orders and later calls back with
/// execution reports at the callback address it was handed.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Submit an order's economic terms to the venue.
    ///
    /// `Ok(())` means the venue accepted the order for execution; fills
    /// arrive asynchronously. Any `Err` is terminal for the order.
    async fn submit(&self, order: &Order) -> Result<()>;

    /// Request cancellation of a resting order at the venue. Best-effort:
    /// the authoritative cancel already happened in the ledger.
    async fn cancel(&self, order: &Order) -> Result<()>;

    /// Venue name, recorded on fills and journal entries.
    fn name(&self) -> &str;
}

/// Last-trade reference price lookup, fed by the market-data simulator.
pub trait ReferencePrices: Send + Sync {
    fn last_trade(&self, symbol: &Symbol) -> Option<f64>;
}

/// Risk-violation event published to the notification system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub event_type: String,
    pub producer: String,
    pub severity: String,
    pub payload: serde_json::Value,
    pub dedupe_key: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RiskEvent {
    pub fn violation(reason: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: "risk.violation".into(),
            producer: "simbroker".into(),
            severity: "high".into(),
            payload,
            dedupe_key: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Outbound notification sink. Fire-and-forget from the caller's point of
/// view: a delivery failure must never block a risk decision.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: RiskEvent) -> Result<()>;
}
