//! Order Router - venue submission and composite order expansion
//!
//! Composite types (OCO, BRACKET) are expanded into an explicit order graph
//! before anything is routed: children carry `parent_order_id`, and OCO legs
//! point `linked_order_id` at each other so the cancel cascade is a graph
//! invariant instead of scattered conditionals.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::broadcast::{BroadcastHub, BrokerEvent};
use crate::books::OrderBooks;
use crate::core::{
    ExecutionVenue, Order, OrderId, OrderStatus, OrderType, Side, TimeInForce,
};
use crate::ledger::OrderLedger;

fn child_order(
    parent: &Order,
    order_type: OrderType,
    side: Side,
    limit_price: Option<f64>,
    stop_price: Option<f64>,
    tif: TimeInForce,
    now: DateTime<Utc>,
) -> Order {
    Order {
        id: OrderId::new(),
        symbol: parent.symbol.clone(),
        side,
        order_type,
        qty: parent.qty,
        limit_price,
        stop_price,
        trailing_percent: None,
        trailing_amount: None,
        tif,
        gtd_date: None,
        profit_target: None,
        stop_loss: None,
        parent_order_id: Some(parent.id.clone()),
        linked_order_id: None,
        notes: parent.notes.clone(),
        status: OrderStatus::New,
        filled_qty: 0,
        leaves_qty: parent.qty,
        avg_price: None,
        message: None,
        created_at: now,
        triggered_at: None,
        last_modified: now,
        execution_log: Vec::new(),
        book_snapshots: Vec::new(),
    }
}

/// Expand an OCO container into its two legs: a LIMIT and a STOP sharing
/// quantity and side, linked to each other for the cancel cascade.
pub fn expand_oco(parent: &Order, now: DateTime<Utc>) -> (Order, Order) {
    let mut limit_leg = child_order(
        parent,
        OrderType::Limit,
        parent.side,
        parent.limit_price,
        None,
        parent.tif,
        now,
    );
    let mut stop_leg = child_order(
        parent,
        OrderType::Stop,
        parent.side,
        None,
        parent.stop_price,
        parent.tif,
        now,
    );
    limit_leg.linked_order_id = Some(stop_leg.id.clone());
    stop_leg.linked_order_id = Some(limit_leg.id.clone());
    (limit_leg, stop_leg)
}

/// Expand a BRACKET container into entry + profit-target + stop-loss.
/// Only the entry is routed; the exits are representable but dormant.
pub fn expand_bracket(parent: &Order, now: DateTime<Utc>) -> (Order, Order, Order) {
    let entry = child_order(
        parent,
        OrderType::Market,
        parent.side,
        None,
        None,
        parent.tif,
        now,
    );
    let target = child_order(
        parent,
        OrderType::Limit,
        parent.side.opposite(),
        parent.profit_target,
        None,
        TimeInForce::Gtc,
        now,
    );
    let stop = child_order(
        parent,
        OrderType::Stop,
        parent.side.opposite(),
        None,
        parent.stop_loss,
        TimeInForce::Gtc,
        now,
    );
    (entry, target, stop)
}

pub struct OrderRouter {
    ledger: Arc<OrderLedger>,
    venue: Arc<dyn ExecutionVenue>,
    books: Arc<OrderBooks>,
    hub: BroadcastHub,
}

impl OrderRouter {
    pub fn new(
        ledger: Arc<OrderLedger>,
        venue: Arc<dyn ExecutionVenue>,
        books: Arc<OrderBooks>,
        hub: BroadcastHub,
    ) -> Self {
        Self {
            ledger,
            venue,
            books,
            hub,
        }
    }

    /// Submit one order to the venue. Side effects only: a venue timeout or
    /// non-accept marks the order REJECTED with a descriptive message and is
    /// broadcast — recorded, never raised, never retried.
    pub async fn route(&self, order: &Order) {
        if matches!(order.order_type, OrderType::Limit | OrderType::StopLimit)
            && let Some(price) = order.limit_price
        {
            // resting level is visible in the book while the order works
            self.books
                .add_level(&order.symbol, order.side, price, order.qty);
        }

        debug!(
            "Routing order {} to {}: {} {} {} {:?}",
            order.id,
            self.venue.name(),
            order.symbol,
            order.side,
            order.qty,
            order.order_type
        );

        if let Err(e) = self.venue.submit(order).await {
            warn!("Venue rejected order {}: {}", order.id, e);
            match self.ledger.mutate(&order.id, |o| {
                o.status = OrderStatus::Rejected;
                o.message = Some(format!("Route error: {e}"));
                o.last_modified = Utc::now();
            }) {
                Ok(updated) => {
                    self.hub.send(BrokerEvent::OrderUpdate(updated));
                }
                Err(err) => {
                    warn!("Could not record routing failure for {}: {}", order.id, err);
                }
            }
        }
    }

    /// Best-effort venue-side cancel. The authoritative cancel already
    /// happened in the ledger, so failures are only logged.
    pub async fn cancel_at_venue(&self, order: &Order) {
        if let Err(e) = self.venue.cancel(order).await {
            debug!("Venue cancel for {} failed: {}", order.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Error, OrderRequest, Result, Symbol};
    use async_trait::async_trait;

    fn parent(order_type: OrderType) -> Order {
        let req = OrderRequest {
            symbol: Symbol::new("AAPL"),
            side: Side::Buy,
            order_type,
            qty: 10,
            limit_price: Some(110.0),
            stop_price: Some(95.0),
            trailing_percent: None,
            trailing_amount: None,
            tif: TimeInForce::Day,
            gtd_date: None,
            profit_target: Some(120.0),
            stop_loss: Some(90.0),
            parent_order_id: None,
            linked_order_id: None,
            notes: None,
        };
        Order::from_request(OrderId::new(), req, Utc::now())
    }

    #[test]
    fn oco_legs_link_to_each_other() {
        let p = parent(OrderType::Oco);
        let (limit_leg, stop_leg) = expand_oco(&p, Utc::now());

        assert_eq!(limit_leg.order_type, OrderType::Limit);
        assert_eq!(limit_leg.limit_price, Some(110.0));
        assert_eq!(stop_leg.order_type, OrderType::Stop);
        assert_eq!(stop_leg.stop_price, Some(95.0));

        assert_eq!(limit_leg.parent_order_id, Some(p.id.clone()));
        assert_eq!(stop_leg.parent_order_id, Some(p.id.clone()));
        assert_eq!(limit_leg.linked_order_id, Some(stop_leg.id.clone()));
        assert_eq!(stop_leg.linked_order_id, Some(limit_leg.id.clone()));
    }

    #[test]
    fn bracket_exits_oppose_the_entry() {
        let p = parent(OrderType::Bracket);
        let (entry, target, stop) = expand_bracket(&p, Utc::now());

        assert_eq!(entry.order_type, OrderType::Market);
        assert_eq!(entry.side, Side::Buy);
        assert_eq!(target.side, Side::Sell);
        assert_eq!(target.limit_price, Some(120.0));
        assert_eq!(target.tif, TimeInForce::Gtc);
        assert_eq!(stop.side, Side::Sell);
        assert_eq!(stop.stop_price, Some(90.0));
        assert_eq!(stop.tif, TimeInForce::Gtc);
        for o in [&entry, &target, &stop] {
            assert_eq!(o.parent_order_id, Some(p.id.clone()));
        }
    }

    struct RefusingVenue;

    #[async_trait]
    impl ExecutionVenue for RefusingVenue {
        async fn submit(&self, _order: &Order) -> Result<()> {
            Err(Error::Routing("venue returned 503".into()))
        }
        async fn cancel(&self, _order: &Order) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "refusing"
        }
    }

    #[tokio::test]
    async fn routing_failure_is_recorded_not_raised() {
        let ledger = Arc::new(OrderLedger::new());
        let books = Arc::new(OrderBooks::new());
        let hub = BroadcastHub::default();
        let router = OrderRouter::new(ledger.clone(), Arc::new(RefusingVenue), books, hub.clone());

        let order = parent(OrderType::Limit);
        let id = order.id.clone();
        ledger.insert(order.clone());

        let mut rx = hub.subscribe();
        router.route(&order).await;

        let stored = ledger.get(&id).unwrap();
        assert_eq!(stored.status, OrderStatus::Rejected);
        assert!(stored.message.as_deref().unwrap().contains("Route error"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BrokerEvent::OrderUpdate(o) if o.id == id
        ));
    }

    #[tokio::test]
    async fn limit_routing_rests_a_book_level() {
        struct AcceptingVenue;
        #[async_trait]
        impl ExecutionVenue for AcceptingVenue {
            async fn submit(&self, _order: &Order) -> Result<()> {
                Ok(())
            }
            async fn cancel(&self, _order: &Order) -> Result<()> {
                Ok(())
            }
            fn name(&self) -> &str {
                "accepting"
            }
        }

        let ledger = Arc::new(OrderLedger::new());
        let books = Arc::new(OrderBooks::new());
        let router = OrderRouter::new(
            ledger.clone(),
            Arc::new(AcceptingVenue),
            books.clone(),
            BroadcastHub::default(),
        );

        let order = parent(OrderType::Limit);
        let before = books.snapshot(&order.symbol).bids.len();
        ledger.insert(order.clone());
        router.route(&order).await;
        assert_eq!(books.snapshot(&order.symbol).bids.len(), before + 1);
    }
}
