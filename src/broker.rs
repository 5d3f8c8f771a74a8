//! Brokerage facade - order intake, cancellation, and the query surface
//!
//! This is the boundary the (out-of-scope) transport layer calls into.
//! Every public operation catches its failures in the error taxonomy and
//! leaves ledger/position state consistent.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::books::OrderBooks;
use crate::broadcast::{BroadcastHub, BrokerEvent};
use crate::core::config::MonitorConfig;
use crate::core::{
    BookSnapshot, Config, Error, ExecutionReport, ExecutionVenue, NotificationSink, Order,
    OrderId, OrderRequest, OrderStatus, OrderType, ReferencePrices, Result, Symbol,
};
use crate::journal::{JournalAnalytics, TradeJournal, TradeJournalEntry};
use crate::ledger::OrderLedger;
use crate::monitor::ConditionalMonitor;
use crate::positions::{Position, PositionLedger, RiskMetrics};
use crate::reconcile::ExecutionReconciler;
use crate::risk::RiskGate;
use crate::router::{expand_bracket, expand_oco, OrderRouter};

/// Session counters for the stats query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerStats {
    pub total_orders: usize,
    pub filled_orders: usize,
    pub pending_orders: usize,
    pub rejected_orders: usize,
    pub conditional_orders: usize,
    pub total_volume: u64,
    pub total_value: f64,
    pub trade_journal_entries: usize,
    pub active_positions: usize,
}

pub struct Brokerage {
    ledger: Arc<OrderLedger>,
    positions: Arc<PositionLedger>,
    journal: Arc<TradeJournal>,
    books: Arc<OrderBooks>,
    refs: Arc<dyn ReferencePrices>,
    risk: RiskGate,
    router: Arc<OrderRouter>,
    reconciler: ExecutionReconciler,
    hub: BroadcastHub,
}

impl Brokerage {
    pub fn new(
        config: &Config,
        venue: Arc<dyn ExecutionVenue>,
        refs: Arc<dyn ReferencePrices>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let ledger = Arc::new(OrderLedger::new());
        let positions = Arc::new(PositionLedger::new());
        let journal = Arc::new(TradeJournal::new(config.journal.max_entries));
        let books = Arc::new(OrderBooks::new());
        let hub = BroadcastHub::default();
        let router = Arc::new(OrderRouter::new(
            ledger.clone(),
            venue,
            books.clone(),
            hub.clone(),
        ));
        let risk = RiskGate::new(config.risk.clone(), refs.clone(), sink);
        let reconciler = ExecutionReconciler::new(
            ledger.clone(),
            positions.clone(),
            journal.clone(),
            books.clone(),
            hub.clone(),
        );
        Self {
            ledger,
            positions,
            journal,
            books,
            refs,
            risk,
            router,
            reconciler,
            hub,
        }
    }

    /// Build the conditional order monitor wired to this brokerage. The
    /// caller owns spawning and shutdown.
    pub fn monitor(&self, config: MonitorConfig) -> ConditionalMonitor {
        ConditionalMonitor::new(
            self.ledger.clone(),
            self.router.clone(),
            self.refs.clone(),
            self.hub.clone(),
            config,
        )
    }

    /// Order intake: validate, risk-check, insert, then route or pend.
    /// Returns the created order with its server-assigned id, or a
    /// validation/risk failure with the order never created.
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order> {
        let request = request.normalized();
        request.validate()?;
        self.risk.check(&request)?;

        let now = Utc::now();
        let mut order = Order::from_request(OrderId::new(), request, now);
        info!(
            "Accepted order {}: {} {} {} {:?}",
            order.id, order.symbol, order.side, order.qty, order.order_type
        );

        if order.order_type.is_conditional() {
            order.status = OrderStatus::StopPending;
            self.ledger.insert(order.clone());
            self.hub.send(BrokerEvent::OrderUpdate(order.clone()));
            return Ok(order);
        }

        match order.order_type {
            OrderType::Oco => {
                let (limit_leg, stop_leg) = expand_oco(&order, now);
                self.ledger.insert_many(vec![
                    order.clone(),
                    limit_leg.clone(),
                    stop_leg.clone(),
                ]);
                self.router.route(&limit_leg).await;
                self.router.route(&stop_leg).await;
            }
            OrderType::Bracket => {
                let (entry, target, stop) = expand_bracket(&order, now);
                self.ledger
                    .insert_many(vec![order.clone(), entry.clone(), target, stop]);
                // only the entry goes out; the exits stay dormant
                self.router.route(&entry).await;
            }
            _ => {
                self.ledger.insert(order.clone());
                self.router.route(&order).await;
            }
        }
        self.hub.send(BrokerEvent::OrderUpdate(order.clone()));

        // routing may already have rejected it; answer with the ledger view
        Ok(self.ledger.get(&order.id).unwrap_or(order))
    }

    /// Cancel an order, cascading to its OCO peer. `NotFound` for unknown
    /// ids, `InvalidState` for terminal orders.
    pub async fn cancel_order(&self, id: &OrderId) -> Result<Order> {
        let (canceled, peer) = self.ledger.cancel(id, "Canceled by user", Utc::now())?;
        info!("Canceled order {}", canceled.id);

        self.router.cancel_at_venue(&canceled).await;
        if let Some(peer) = peer {
            self.router.cancel_at_venue(&peer).await;
            self.hub.send(BrokerEvent::OrderUpdate(peer));
        }
        self.hub.send(BrokerEvent::OrderUpdate(canceled.clone()));
        Ok(canceled)
    }

    /// Execution report intake from the venue callback.
    pub fn apply_execution(&self, report: &ExecutionReport) -> Result<Order> {
        self.reconciler.apply(report)
    }

    // --- query surface ---

    pub fn order(&self, id: &OrderId) -> Result<Order> {
        self.ledger.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    pub fn orders(&self) -> Vec<Order> {
        self.ledger.list()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.list()
    }

    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.positions.get(symbol)
    }

    pub fn journal(&self, limit: usize, offset: usize) -> Vec<TradeJournalEntry> {
        self.journal.entries(limit, offset)
    }

    pub fn journal_analytics(&self) -> JournalAnalytics {
        self.journal.analytics()
    }

    pub fn risk_metrics(&self) -> RiskMetrics {
        self.positions.risk_metrics(self.refs.as_ref())
    }

    pub fn book_snapshot(&self, symbol: &Symbol) -> BookSnapshot {
        self.books.snapshot(symbol)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BrokerEvent> {
        self.hub.subscribe()
    }

    pub fn stats(&self) -> BrokerStats {
        let orders = self.ledger.list();
        let mut stats = BrokerStats {
            total_orders: orders.len(),
            filled_orders: 0,
            pending_orders: 0,
            rejected_orders: 0,
            conditional_orders: self.ledger.pending_len(),
            total_volume: 0,
            total_value: 0.0,
            trade_journal_entries: self.journal.len(),
            active_positions: self.positions.len(),
        };
        for order in &orders {
            match order.status {
                OrderStatus::Filled => {
                    stats.filled_orders += 1;
                    stats.total_volume += order.filled_qty;
                    stats.total_value +=
                        order.filled_qty as f64 * order.avg_price.unwrap_or(0.0);
                }
                OrderStatus::New | OrderStatus::Partial => stats.pending_orders += 1,
                OrderStatus::Rejected => stats.rejected_orders += 1,
                _ => {}
            }
        }
        stats.total_value = (stats.total_value * 100.0).round() / 100.0;
        stats
    }
}
