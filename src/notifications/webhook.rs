use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::{
    config::WebhookConfig,
    error::{AppError, Result},
    notifications::{NotificationEvent, Notifier},
};

/// Posts each event as JSON to a configured endpoint (ops chat bridge,
/// real-time event relay, whatever the deployment wires up).
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: Option<WebhookConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if !cfg.enabled {
                return None;
            }
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_seconds))
                .build()
                .ok()?;
            Some(Self { client, config: cfg })
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn health_check(&self) -> Result<()> {
        if self.config.url.is_empty() {
            return Err(AppError::Notification("Webhook URL not configured".to_string()));
        }
        Ok(())
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let payload = match event {
            NotificationEvent::PaymentSucceeded { payment }
            | NotificationEvent::PaymentFailed { payment }
            | NotificationEvent::PaymentRefunded { payment } => json!({
                "event": event.kind(),
                "payment": payment,
            }),
            NotificationEvent::EnrollmentCreated { enrollment } => json!({
                "event": event.kind(),
                "enrollment": enrollment,
            }),
            NotificationEvent::PurchaseOrderSubmitted { order }
            | NotificationEvent::PurchaseOrderDecided { order } => json!({
                "event": event.kind(),
                "purchase_order": order,
            }),
        };

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("Webhook POST failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Webhook endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
