//! Mail delivery
//!
//! `SendGridNotifier` talks to the SendGrid v3 API. Without an API key the
//! application falls back to `LogNotifier`, which only writes the message
//! to the log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::services::Notifier;
use crate::domain::MonitorError;
use crate::infrastructure::config::MailConfig;

const MAIL_TIMEOUT: Duration = Duration::from_secs(20);

pub struct SendGridNotifier {
    client: Client,
    endpoint: String,
    api_key: String,
    from_address: String,
}

impl SendGridNotifier {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, from_address: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(MAIL_TIMEOUT)
            .build()
            .context("Failed to create mail HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from_address: from_address.into(),
        })
    }

    fn request_body(&self, recipient: &str, subject: &str, body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": recipient }] }],
            "from": { "email": self.from_address },
            "subject": subject,
            "content": [{ "type": "text/html", "value": body }],
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<String, MonitorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(recipient, subject, body))
            .send()
            .await
            .map_err(|e| MonitorError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "Mail API rejected message: {detail}");
            return Err(MonitorError::Notification(format!("HTTP {}", status.as_u16())));
        }

        info!(recipient, subject, "Email sent");
        Ok(format!("email sent to {recipient} (HTTP {})", status.as_u16()))
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<String, MonitorError> {
        info!(recipient, subject, "Mail transport not configured, logging message");
        debug!("{body}");
        Ok("logged (no mail transport configured)".to_string())
    }
}

/// SendGrid when an API key is configured, the log otherwise
pub fn build_notifier(config: &MailConfig) -> Result<Arc<dyn Notifier>> {
    match config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            info!(from = %config.from_address, "Using SendGrid mail transport");
            Ok(Arc::new(SendGridNotifier::new(&config.endpoint, key, &config.from_address)?))
        }
        None => {
            warn!("No mail API key configured; notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
