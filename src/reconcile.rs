//! Execution Reconciler - applies venue execution reports to state
//!
//! The order mutation itself is one atomic ledger section. Position,
//! journal, and book bookkeeping are enrichment: they run after the lock is
//! released and a failure there never rolls back the fill already applied
//! to the order record. The broadcast of the updated order goes out last,
//! once every piece of state is consistent.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::books::OrderBooks;
use crate::broadcast::{BroadcastHub, BrokerEvent};
use crate::core::{Error, ExecutionReport, Fill, Order, OrderStatus, Result, Side};
use crate::journal::TradeJournal;
use crate::ledger::OrderLedger;
use crate::positions::PositionLedger;

/// Bound floating drift on the running average: 6 decimal places.
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub struct ExecutionReconciler {
    ledger: Arc<OrderLedger>,
    positions: Arc<PositionLedger>,
    journal: Arc<TradeJournal>,
    books: Arc<OrderBooks>,
    hub: BroadcastHub,
}

impl ExecutionReconciler {
    pub fn new(
        ledger: Arc<OrderLedger>,
        positions: Arc<PositionLedger>,
        journal: Arc<TradeJournal>,
        books: Arc<OrderBooks>,
        hub: BroadcastHub,
    ) -> Self {
        Self {
            ledger,
            positions,
            journal,
            books,
            hub,
        }
    }

    /// Apply one execution report. Fails with `UnknownOrder` for an
    /// unrecognized id and `InvalidState` for a terminal order; both leave
    /// all state untouched.
    pub fn apply(&self, report: &ExecutionReport) -> Result<Order> {
        let updated = self
            .ledger
            .mutate(&report.order_id, |o| {
                o.filled_qty += report.qty;
                o.leaves_qty = o.qty.saturating_sub(o.filled_qty);
                if o.filled_qty > 0 {
                    o.avg_price = Some(match o.avg_price {
                        None => report.price,
                        Some(avg) => round6(
                            (avg * (o.filled_qty - report.qty) as f64
                                + report.price * report.qty as f64)
                                / o.filled_qty as f64,
                        ),
                    });
                }
                o.status = report.status;
                o.message = report.message.clone();
                o.last_modified = Utc::now();
                o.execution_log.push(Fill {
                    timestamp: report.execution_time,
                    price: report.price,
                    qty: report.qty,
                    venue: report.venue.clone(),
                });
                if let Some(snapshot) = &report.order_book_snapshot {
                    o.book_snapshots.push(snapshot.clone());
                }
            })
            .map_err(|e| match e {
                Error::NotFound(id) => Error::UnknownOrder(id),
                other => other,
            })?;

        debug!(
            "Applied execution to {}: {} @ {:.2}, filled {}/{}",
            updated.id, report.qty, report.price, updated.filled_qty, updated.qty
        );

        // enrichment: derived state, outside the ledger lock
        let (position, realized) = self.positions.apply_fill(
            &updated.symbol,
            updated.side,
            report.qty,
            report.price,
        );
        let realized = (updated.side == Side::Sell).then_some(realized);
        self.journal.record(
            report,
            &updated,
            report.order_book_snapshot.as_ref(),
            realized,
        );
        self.books
            .remove_level(&updated.symbol, updated.side, report.price, report.qty);

        // a filled OCO leg stops its peer
        if updated.status == OrderStatus::Filled
            && let Some(linked) = updated.linked_order_id.clone()
            && let Some(peer) =
                self.ledger
                    .cascade_cancel(&linked, "Canceled due to OCO fill", Utc::now())
        {
            self.hub.send(BrokerEvent::OrderUpdate(peer));
        }

        self.hub.send(BrokerEvent::PositionUpdate(position));
        self.hub.send(BrokerEvent::OrderUpdate(updated.clone()));
        Ok(updated)
    }
}
