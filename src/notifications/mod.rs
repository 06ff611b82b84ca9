use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Enrollment, Payment, PurchaseOrder};
use crate::error::Result;

pub mod email;
pub mod webhook;

/// Events fanned out after durable state changes. Dispatch is strictly
/// best-effort: a failed channel is logged and never rolls back payment or
/// enrollment state.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    PaymentSucceeded { payment: Payment },
    PaymentFailed { payment: Payment },
    PaymentRefunded { payment: Payment },
    EnrollmentCreated { enrollment: Enrollment },
    PurchaseOrderSubmitted { order: PurchaseOrder },
    PurchaseOrderDecided { order: PurchaseOrder },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded { .. } => "payment.succeeded",
            Self::PaymentFailed { .. } => "payment.failed",
            Self::PaymentRefunded { .. } => "payment.refunded",
            Self::EnrollmentCreated { .. } => "enrollment.created",
            Self::PurchaseOrderSubmitted { .. } => "purchase_order.submitted",
            Self::PurchaseOrderDecided { .. } => "purchase_order.decided",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn health_check(&self) -> Result<()>;
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

pub struct NotificationManager {
    channels: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, channel: Arc<dyn Notifier>) {
        if channel.is_enabled() {
            let mut channels = self.channels.write().await;
            tracing::info!("Registered notification channel: {}", channel.name());
            channels.push(channel);
        }
    }

    pub async fn dispatch(&self, event: NotificationEvent) {
        let channels = self.channels.read().await;

        for channel in channels.iter() {
            if !channel.is_enabled() {
                continue;
            }

            match channel.notify(&event).await {
                Ok(_) => {
                    tracing::debug!(
                        "Notification channel {} handled {}",
                        channel.name(),
                        event.kind()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Notification channel {} failed on {}: {:?}",
                        channel.name(),
                        event.kind(),
                        e
                    );
                    // Continue with the remaining channels.
                }
            }
        }
    }

    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let channels = self.channels.read().await;
        let mut results = Vec::new();

        for channel in channels.iter() {
            let name = channel.name().to_string();
            let result = channel.health_check().await;
            results.push((name, result));
        }

        results
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
