//! Order Ledger - authoritative order store behind one atomic boundary
//!
//! Every operation runs inside a single `parking_lot::Mutex` section that is
//! never held across an await point, so concurrent reconciliation,
//! cancellation, and monitor-triggered routing can never observe a
//! half-updated order. The pending-conditional index lives inside the same
//! lock and is kept consistent by the repository itself: an order is in the
//! index exactly while its status is `STOP_PENDING`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::core::{Error, Order, OrderId, OrderStatus, Result};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    pending: HashSet<OrderId>,
}

impl Inner {
    fn sync_pending(&mut self, id: &OrderId, status: OrderStatus) {
        if status == OrderStatus::StopPending {
            self.pending.insert(id.clone());
        } else {
            self.pending.remove(id);
        }
    }

    /// Cancel a live linked order in the same critical section. Terminal
    /// peers are left untouched, which makes OCO cascades mutually
    /// idempotent.
    fn cascade(&mut self, id: &OrderId, reason: &str, now: DateTime<Utc>) -> Option<Order> {
        let peer = self.orders.get_mut(id)?;
        if peer.status.is_terminal() {
            return None;
        }
        peer.status = OrderStatus::Canceled;
        peer.message = Some(reason.to_string());
        peer.last_modified = now;
        let canceled = peer.clone();
        self.pending.remove(id);
        Some(canceled)
    }
}

pub struct OrderLedger {
    inner: Mutex<Inner>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn insert(&self, order: Order) {
        let mut inner = self.inner.lock();
        inner.sync_pending(&order.id, order.status);
        inner.orders.insert(order.id.clone(), order);
    }

    /// Insert a composite order graph (parent plus children) atomically, so
    /// no reader can see a parent without its legs.
    pub fn insert_many(&self, orders: Vec<Order>) {
        let mut inner = self.inner.lock();
        for order in orders {
            inner.sync_pending(&order.id, order.status);
            inner.orders.insert(order.id.clone(), order);
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.inner.lock().orders.get(id).cloned()
    }

    pub fn list(&self) -> Vec<Order> {
        self.inner.lock().orders.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Snapshot of the pending-conditional orders for a monitor pass.
    pub fn pending_orders(&self) -> Vec<Order> {
        let inner = self.inner.lock();
        inner
            .pending
            .iter()
            .filter_map(|id| inner.orders.get(id).cloned())
            .collect()
    }

    /// Atomic read-modify-write on one order. The closure runs entirely
    /// under the lock; terminal orders refuse mutation.
    pub fn mutate<F>(&self, id: &OrderId, f: F) -> Result<Order>
    where
        F: FnOnce(&mut Order),
    {
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        if order.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "order {} is {:?} and can no longer change",
                id, order.status
            )));
        }
        f(order);
        let updated = order.clone();
        inner.sync_pending(id, updated.status);
        Ok(updated)
    }

    /// Atomically claim a pending conditional order for routing: it is
    /// removed from the index and stamped TRIGGERED in one step, so a
    /// conditional order can never trigger twice.
    pub fn claim_triggered(&self, id: &OrderId, now: DateTime<Utc>) -> Option<Order> {
        let mut inner = self.inner.lock();
        if !inner.pending.remove(id) {
            return None;
        }
        let order = inner.orders.get_mut(id)?;
        order.status = OrderStatus::Triggered;
        order.triggered_at = Some(now);
        order.last_modified = now;
        Some(order.clone())
    }

    /// Cancel an order and cascade to its linked (OCO) peer in a single
    /// critical section. Returns the canceled order and the peer if one was
    /// cascaded.
    pub fn cancel(
        &self,
        id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, Option<Order>)> {
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        if order.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "order {} cannot be canceled in {:?} status",
                id, order.status
            )));
        }
        order.status = OrderStatus::Canceled;
        order.message = Some(reason.to_string());
        order.last_modified = now;
        let canceled = order.clone();
        inner.pending.remove(id);

        let peer = canceled
            .linked_order_id
            .clone()
            .and_then(|lid| inner.cascade(&lid, "Canceled due to OCO", now));

        Ok((canceled, peer))
    }

    /// Cancel a linked order if it is still live (used when one OCO leg
    /// fills). No-op on unknown or terminal peers.
    pub fn cascade_cancel(
        &self,
        id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Option<Order> {
        self.inner.lock().cascade(id, reason, now)
    }
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}
