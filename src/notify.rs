//! Notification delivery - risk-violation events to the notification system

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::core::config::NotifierConfig;
use crate::core::{Error, NotificationSink, Result, RiskEvent};

/// HTTP client for the external notification system.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl NotificationSink for HttpNotifier {
    async fn publish(&self, event: RiskEvent) -> Result<()> {
        let url = format!("{}/v1/events", self.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("X-API-Key", key);
        }

        let res = self
            .client
            .post(&url)
            .headers(headers)
            .json(&event)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::Internal(format!(
                "notification system returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Sink that drops every event. Used when no notifier is configured.
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn publish(&self, _event: RiskEvent) -> Result<()> {
        Ok(())
    }
}
