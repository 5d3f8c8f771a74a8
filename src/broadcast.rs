//! Broadcast hub - state-change fan-out to connected subscribers
//!
//! Built on tokio broadcast channels: delivery is best-effort and isolated
//! per subscriber. A lagged or dropped receiver never blocks the others and
//! disappears from the receiver set on its own.

use tokio::sync::broadcast;

use crate::core::Order;
use crate::positions::Position;

/// Events emitted after ledger/position state is fully consistent.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    OrderUpdate(Order),
    OrderTriggered(Order),
    PositionUpdate(Position),
}

#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<BrokerEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers reached, or `None` when nobody is
    /// listening (not an error: broadcast is fire-and-forget).
    pub fn send(&self, event: BrokerEvent) -> Option<usize> {
        self.tx.send(event).ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(1_024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Order, OrderId, OrderRequest, OrderType, Side, Symbol, TimeInForce};
    use chrono::Utc;

    fn sample_order() -> Order {
        let req = OrderRequest {
            symbol: Symbol::new("AAPL"),
            side: Side::Buy,
            order_type: OrderType::Market,
            qty: 1,
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
        };
        Order::from_request(OrderId::new(), req, Utc::now())
    }

    #[test]
    fn send_with_no_receivers_is_a_noop() {
        let hub = BroadcastHub::default();
        assert!(hub.send(BrokerEvent::OrderUpdate(sample_order())).is_none());
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let hub = BroadcastHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();
        assert_eq!(hub.receiver_count(), 2);

        let order = sample_order();
        assert_eq!(hub.send(BrokerEvent::OrderUpdate(order.clone())), Some(2));

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                BrokerEvent::OrderUpdate(o) => assert_eq!(o.id, order.id),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dropped_subscriber_leaves_the_set() {
        let hub = BroadcastHub::default();
        let rx = hub.subscribe();
        drop(rx);
        assert_eq!(hub.receiver_count(), 0);
        assert!(hub.send(BrokerEvent::OrderUpdate(sample_order())).is_none());
    }
}
