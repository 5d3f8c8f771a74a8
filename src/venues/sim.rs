//! Simulated execution venue - accepts everything, fills asynchronously
//!
//! Stands in for the external exchange during tests and local sessions.
//! Accepted orders produce a full fill at the limit price (or the reference
//! price for market-style orders) after a short delay, delivered over the
//! callback channel the venue was constructed with.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::books::OrderBooks;
use crate::core::{
    ExecutionReport, ExecutionVenue, Order, OrderStatus, ReferencePrices, Result,
};

pub const SIM_VENUE: &str = "SIMX";

pub struct SimVenue {
    refs: Arc<dyn ReferencePrices>,
    /// The venue's own book; its snapshot rides along on every report.
    books: OrderBooks,
    reports: mpsc::UnboundedSender<ExecutionReport>,
    fill_delay: Duration,
}

impl SimVenue {
    pub fn new(
        refs: Arc<dyn ReferencePrices>,
        reports: mpsc::UnboundedSender<ExecutionReport>,
        fill_delay: Duration,
    ) -> Self {
        Self {
            refs,
            books: OrderBooks::new(),
            reports,
            fill_delay,
        }
    }

    fn fill_price(&self, order: &Order) -> f64 {
        order
            .limit_price
            .or_else(|| self.refs.last_trade(&order.symbol))
            .or(order.stop_price)
            .unwrap_or(100.0)
    }
}

#[async_trait]
impl ExecutionVenue for SimVenue {
    async fn submit(&self, order: &Order) -> Result<()> {
        let report = ExecutionReport {
            order_id: order.id.clone(),
            venue: SIM_VENUE.into(),
            price: self.fill_price(order),
            qty: order.qty,
            is_final: true,
            status: OrderStatus::Filled,
            message: Some(format!("Filled by {SIM_VENUE}")),
            execution_time: Utc::now(),
            order_book_snapshot: Some(self.books.snapshot(&order.symbol)),
        };

        debug!(
            "Sim venue accepted order {}; fill in {:?}",
            order.id, self.fill_delay
        );
        let tx = self.reports.clone();
        let delay = self.fill_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // receiver gone means the session is shutting down
            let _ = tx.send(report);
        });
        Ok(())
    }

    async fn cancel(&self, _order: &Order) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        SIM_VENUE
    }
}
