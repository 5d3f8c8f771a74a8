//! Conditional Order Monitor - supervised trigger evaluation loop
//!
//! State machine per pending order: STOP_PENDING -> TRIGGERED -> routed.
//! The loop evaluates every pending conditional order against the latest
//! reference price once per interval. One order's failure never halts the
//! pass, a whole-pass failure backs off, and shutdown is safe at any point
//! between per-order evaluations.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::broadcast::{BroadcastHub, BrokerEvent};
use crate::core::config::MonitorConfig;
use crate::core::{Order, OrderType, ReferencePrices, Result, Side};
use crate::ledger::OrderLedger;
use crate::router::OrderRouter;

/// Trigger predicate for a pending conditional order at a reference price.
/// Pure function of its inputs.
pub fn should_trigger(order: &Order, price: f64) -> bool {
    let Some(stop) = order.stop_price else {
        return false;
    };
    match order.order_type {
        OrderType::Stop | OrderType::StopLimit => match order.side {
            Side::Buy => price >= stop,
            Side::Sell => price <= stop,
        },
        OrderType::TrailingStop | OrderType::TrailingStopLimit => {
            let trail = match (order.trailing_percent, order.trailing_amount) {
                (Some(pct), _) => price * pct / 100.0,
                (None, Some(amount)) => amount,
                (None, None) => return false,
            };
            match order.side {
                Side::Buy => price <= stop - trail,
                Side::Sell => price >= stop + trail,
            }
        }
        _ => false,
    }
}

pub struct ConditionalMonitor {
    ledger: Arc<OrderLedger>,
    router: Arc<OrderRouter>,
    refs: Arc<dyn ReferencePrices>,
    hub: BroadcastHub,
    config: MonitorConfig,
}

impl ConditionalMonitor {
    pub fn new(
        ledger: Arc<OrderLedger>,
        router: Arc<OrderRouter>,
        refs: Arc<dyn ReferencePrices>,
        hub: BroadcastHub,
        config: MonitorConfig,
    ) -> Self {
        Self {
            ledger,
            router,
            refs,
            hub,
            config,
        }
    }

    /// One evaluation pass over the pending index. Returns how many orders
    /// triggered. Per-order problems are logged and skipped.
    pub async fn pass(&self) -> Result<usize> {
        let mut triggered = 0;
        for order in self.ledger.pending_orders() {
            let Some(price) = self.refs.last_trade(&order.symbol) else {
                // no reference yet; evaluate again next pass
                continue;
            };
            if !should_trigger(&order, price) {
                continue;
            }
            // claim removes the order from the index atomically, so a
            // concurrent cancel or a second pass can never re-trigger it
            let Some(claimed) = self.ledger.claim_triggered(&order.id, Utc::now()) else {
                continue;
            };
            info!(
                "Conditional order {} triggered: {} {} at {:.2}",
                claimed.id, claimed.symbol, claimed.side, price
            );
            self.router.route(&claimed).await;
            self.hub.send(BrokerEvent::OrderTriggered(claimed));
            triggered += 1;
        }
        Ok(triggered)
    }

    /// Run until the shutdown channel fires. A whole-pass failure sleeps the
    /// configured backoff before the next attempt; the task itself never
    /// terminates on an evaluation error.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Starting conditional order monitor (interval {:?})",
            self.config.poll_interval()
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.pass().await {
                        warn!("Monitor pass failed: {e}; backing off");
                        tokio::time::sleep(self.config.error_backoff()).await;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Conditional order monitor shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::OrderBooks;
    use crate::core::{
        ExecutionVenue, OrderId, OrderRequest, OrderStatus, Symbol, TimeInForce,
    };
    use crate::feeds::SimReferencePrices;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stop_order(side: Side, order_type: OrderType, stop: f64) -> Order {
        let req = OrderRequest {
            symbol: Symbol::new("AAPL"),
            side,
            order_type,
            qty: 10,
            limit_price: None,
            stop_price: Some(stop),
            trailing_percent: None,
            trailing_amount: None,
            tif: TimeInForce::Day,
            gtd_date: None,
            profit_target: None,
            stop_loss: None,
            parent_order_id: None,
            linked_order_id: None,
            notes: None,
        };
        let mut o = Order::from_request(OrderId::new(), req, Utc::now());
        o.status = OrderStatus::StopPending;
        o
    }

    #[test]
    fn stop_trigger_truth_table() {
        let buy = stop_order(Side::Buy, OrderType::Stop, 105.0);
        assert!(!should_trigger(&buy, 104.99));
        assert!(should_trigger(&buy, 105.0));
        assert!(should_trigger(&buy, 106.0));

        let sell = stop_order(Side::Sell, OrderType::StopLimit, 95.0);
        assert!(!should_trigger(&sell, 95.01));
        assert!(should_trigger(&sell, 95.0));
        assert!(should_trigger(&sell, 90.0));
    }

    #[test]
    fn trailing_trigger_uses_percent_or_amount() {
        let mut buy = stop_order(Side::Buy, OrderType::TrailingStop, 100.0);
        buy.trailing_percent = Some(10.0);
        // trail = 80 * 10% = 8; triggers at price <= 92
        assert!(should_trigger(&buy, 80.0));
        assert!(!should_trigger(&buy, 95.0));

        let mut sell = stop_order(Side::Sell, OrderType::TrailingStop, 100.0);
        sell.trailing_amount = Some(5.0);
        assert!(should_trigger(&sell, 105.0));
        assert!(!should_trigger(&sell, 104.0));

        let bare = stop_order(Side::Buy, OrderType::TrailingStop, 100.0);
        assert!(!should_trigger(&bare, 1.0));
    }

    struct CountingVenue(AtomicUsize);

    #[async_trait]
    impl ExecutionVenue for CountingVenue {
        async fn submit(&self, _order: &Order) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn cancel(&self, _order: &Order) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn monitor_with(
        venue: Arc<CountingVenue>,
        refs: Arc<SimReferencePrices>,
    ) -> (ConditionalMonitor, Arc<OrderLedger>, BroadcastHub) {
        let ledger = Arc::new(OrderLedger::new());
        let hub = BroadcastHub::default();
        let router = Arc::new(OrderRouter::new(
            ledger.clone(),
            venue,
            Arc::new(OrderBooks::new()),
            hub.clone(),
        ));
        let monitor = ConditionalMonitor::new(
            ledger.clone(),
            router,
            refs,
            hub.clone(),
            MonitorConfig::default(),
        );
        (monitor, ledger, hub)
    }

    #[tokio::test]
    async fn buy_stop_triggers_once_across_price_sequence() {
        let venue = Arc::new(CountingVenue(AtomicUsize::new(0)));
        let refs = Arc::new(SimReferencePrices::new(0.0));
        let (monitor, ledger, _hub) = monitor_with(venue.clone(), refs.clone());

        let order = stop_order(Side::Buy, OrderType::Stop, 105.0);
        let id = order.id.clone();
        ledger.insert(order);

        for price in [100.0, 103.0] {
            refs.set(Symbol::new("AAPL"), price);
            assert_eq!(monitor.pass().await.unwrap(), 0);
            assert_eq!(ledger.get(&id).unwrap().status, OrderStatus::StopPending);
        }

        refs.set(Symbol::new("AAPL"), 106.0);
        assert_eq!(monitor.pass().await.unwrap(), 1);
        assert_eq!(ledger.get(&id).unwrap().status, OrderStatus::Triggered);
        assert_eq!(ledger.pending_len(), 0);

        // every later tick still satisfies the predicate; nothing re-fires
        for _ in 0..3 {
            assert_eq!(monitor.pass().await.unwrap(), 0);
        }
        assert_eq!(venue.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trigger_broadcasts_the_status_change() {
        let venue = Arc::new(CountingVenue(AtomicUsize::new(0)));
        let refs = Arc::new(SimReferencePrices::new(110.0));
        let (monitor, ledger, hub) = monitor_with(venue, refs);

        let order = stop_order(Side::Buy, OrderType::Stop, 105.0);
        ledger.insert(order.clone());

        let mut rx = hub.subscribe();
        monitor.pass().await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            BrokerEvent::OrderTriggered(o) if o.id == order.id
        ));
    }

    #[tokio::test]
    async fn missing_reference_price_skips_the_order() {
        let venue = Arc::new(CountingVenue(AtomicUsize::new(0)));
        let refs = Arc::new(SimReferencePrices::new(0.0));
        let (monitor, ledger, _hub) = monitor_with(venue.clone(), refs);

        ledger.insert(stop_order(Side::Buy, OrderType::Stop, 105.0));
        assert_eq!(monitor.pass().await.unwrap(), 0);
        assert_eq!(ledger.pending_len(), 1);
        assert_eq!(venue.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let venue = Arc::new(CountingVenue(AtomicUsize::new(0)));
        let refs = Arc::new(SimReferencePrices::default());
        let (monitor, _ledger, _hub) = monitor_with(venue, refs);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(monitor.run(rx));
        tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
