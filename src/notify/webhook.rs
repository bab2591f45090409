use super::Notifier;
use crate::error::StockWatchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    subject: &'a str,
    body: &'a str,
    sent_at: DateTime<Utc>,
}

/// POSTs each alert as JSON to a configured URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StockWatchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn deliver(&self, subject: &str, body: &str) -> Result<(), StockWatchError> {
        let payload = AlertPayload {
            subject,
            body,
            sent_at: Utc::now(),
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StockWatchError::WebhookStatus(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) {
        match self.deliver(subject, body).await {
            Ok(()) => info!("Alert '{}' delivered to {}", subject, self.url),
            Err(e) => error!("Failed to deliver alert '{}': {}", subject, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_subject_and_body() {
        let payload = AlertPayload {
            subject: "Sell alert - PETR4.SA",
            body: "PETR4.SA rose to 31.00, above your sell target of 30.00.",
            sent_at: Utc::now(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["subject"], "Sell alert - PETR4.SA");
        assert_eq!(
            json["body"],
            "PETR4.SA rose to 31.00, above your sell target of 30.00."
        );
        assert!(json["sent_at"].is_string());
    }

    #[tokio::test]
    async fn unreachable_endpoint_does_not_propagate() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:9/alerts", Duration::from_millis(200)).unwrap();
        notifier.send("subject", "body").await;
    }
}
