//! HTTP execution venue - routes orders to the external exchange
//!
//! The venue accepts an order's economic terms plus a callback address and
//! answers 202 Accepted; execution reports arrive later at the callback.
//! Anything else - timeout included - is a terminal routing failure.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::core::config::VenueConfig;
use crate::core::{
    Error, ExecutionVenue, Order, OrderId, OrderType, Result, Side, Symbol, TimeInForce,
};

/// Wire payload the exchange expects on POST /orders.
#[derive(Debug, Serialize)]
struct VenueOrder<'a> {
    order_id: &'a OrderId,
    symbol: &'a Symbol,
    side: Side,
    order_type: OrderType,
    qty: u64,
    limit_price: Option<f64>,
    stop_price: Option<f64>,
    trailing_percent: Option<f64>,
    tif: TimeInForce,
    callback_url: &'a str,
}

pub struct HttpVenue {
    client: reqwest::Client,
    base_url: String,
    callback_url: String,
}

impl HttpVenue {
    pub fn new(config: &VenueConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            callback_url: config.callback_url.clone(),
        })
    }
}

#[async_trait]
impl ExecutionVenue for HttpVenue {
    async fn submit(&self, order: &Order) -> Result<()> {
        let url = format!("{}/orders", self.base_url);
        let payload = VenueOrder {
            order_id: &order.id,
            symbol: &order.symbol,
            side: order.side,
            order_type: order.order_type,
            qty: order.qty,
            limit_price: order.limit_price,
            stop_price: order.stop_price,
            trailing_percent: order.trailing_percent,
            tif: order.tif,
            callback_url: &self.callback_url,
        };

        debug!("POST {} for order {}", url, order.id);
        let res = self.client.post(&url).json(&payload).send().await?;

        let status = res.status();
        if status != StatusCode::ACCEPTED {
            return Err(Error::Routing(format!("Exchange error: {}", status)));
        }
        Ok(())
    }

    async fn cancel(&self, order: &Order) -> Result<()> {
        let url = format!("{}/orders/{}", self.base_url, order.id);
        let res = self.client.delete(&url).send().await?;
        if !res.status().is_success() {
            return Err(Error::Routing(format!(
                "Exchange cancel error: {}",
                res.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "exchange"
    }
}
