//! Webhook alert sink.
//!
//! Posts each alert as JSON to an operator webhook (chat relay, pager
//! bridge). Every alert is also written to the log first, so a webhook
//! outage never hides an alert from the process output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{Alert, AlertError, AlertPort, LogAlertSink};

/// Alert sink that logs and then POSTs to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: Client,
    url: String,
    log: LogAlertSink,
}

impl WebhookAlertSink {
    /// Create a sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryFailed` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::DeliveryFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            log: LogAlertSink,
        })
    }

    /// Webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AlertPort for WebhookAlertSink {
    async fn send(&self, alert: Alert) -> Result<(), AlertError> {
        self.log.send(alert.clone()).await?;

        let response = self
            .client
            .post(&self.url)
            .json(&alert)
            .send()
            .await
            .map_err(|e| AlertError::DeliveryFailed {
                message: format!("webhook unreachable: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(alert = %alert.title, %status, "Alert delivered to webhook");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AlertError::DeliveryFailed {
            message: format!("webhook returned {status}: {}", body.trim()),
        })
    }
}
