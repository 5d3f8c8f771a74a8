//! Risk Gate - pre-trade limits applied before an order touches the ledger

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

use crate::core::config::RiskLimits;
use crate::core::{
    Error, NotificationSink, OrderRequest, ReferencePrices, Result, RiskEvent,
};

fn to_dec(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// True when `price` sits within `pct` of the last trade. A non-positive
/// last trade disables the check.
fn within_collar(last: f64, price: f64, pct: f64) -> bool {
    if last <= 0.0 {
        return true;
    }
    (to_dec(price) - to_dec(last)).abs() <= to_dec(last) * to_dec(pct)
}

/// Risk Gate - notional cap and reference-price collar.
///
/// Rejections publish a risk-violation event to the notification sink
/// fire-and-forget; the reject decision never waits on delivery. The gate
/// has no ledger side effects.
pub struct RiskGate {
    limits: RiskLimits,
    refs: Arc<dyn ReferencePrices>,
    sink: Arc<dyn NotificationSink>,
}

impl RiskGate {
    pub fn new(
        limits: RiskLimits,
        refs: Arc<dyn ReferencePrices>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { limits, refs, sink }
    }

    pub fn check(&self, request: &OrderRequest) -> Result<()> {
        let last = self.refs.last_trade(&request.symbol).unwrap_or(0.0);
        let basis = request.limit_price.unwrap_or(last);

        let notional = to_dec(basis) * Decimal::from(request.qty);
        let cap = to_dec(self.limits.max_notional_per_order);
        if notional > cap {
            let reason = format!(
                "Max notional exceeded: {} > {}",
                notional.round_dp(2),
                cap.round_dp(2)
            );
            self.report_violation(&reason, request);
            return Err(Error::RiskRejected(reason));
        }

        if !within_collar(last, basis, self.limits.collar_pct) {
            let reason = format!(
                "Outside price collars ±{}% vs last {:.2}",
                (self.limits.collar_pct * 100.0).round() as i64,
                last
            );
            self.report_violation(&reason, request);
            return Err(Error::RiskRejected(reason));
        }

        Ok(())
    }

    /// Publish a violation event without blocking the reject decision. When
    /// no runtime is running (pure unit tests) the event is simply dropped.
    fn report_violation(&self, reason: &str, request: &OrderRequest) {
        let event = RiskEvent::violation(
            reason,
            serde_json::json!({
                "symbol": request.symbol,
                "side": request.side,
                "order_type": request.order_type,
                "qty": request.qty,
                "reason": reason,
            }),
        );
        let sink = Arc::clone(&self.sink);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = sink.publish(event).await {
                    warn!("Risk violation notification failed: {}", e);
                }
            });
        }
    }
}
