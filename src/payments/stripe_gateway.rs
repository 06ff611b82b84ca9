use async_trait::async_trait;
use std::collections::HashMap;
use stripe::{
    Client, CreatePaymentIntent, CreateRefund, Currency, EventObject, EventType, PaymentIntent,
    PaymentIntentId, PaymentIntentStatus, Refund, Webhook, WebhookError,
};

use crate::{
    error::{AppError, Result},
    payments::{GatewayEvent, GatewayIntent, IntentStatus, PaymentGateway},
};

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        Self {
            client: Client::new(api_key),
            webhook_secret,
        }
    }

    fn parse_currency(currency: &str) -> Result<Currency> {
        // Stripe currency codes serialize lowercase; round-trip through
        // serde rather than enumerating the whole ISO list.
        serde_json::from_str(&format!("\"{}\"", currency.to_lowercase()))
            .map_err(|_| AppError::Validation(format!("Unsupported currency: {}", currency)))
    }

    fn parse_intent_id(intent_id: &str) -> Result<PaymentIntentId> {
        intent_id
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid intent id: {}", intent_id)))
    }

    /// `requires_payment_method` is both the initial state of a fresh
    /// intent and the state after a declined attempt. Only the presence of
    /// a payment error makes it a failure; a customer mid-checkout is
    /// still Pending.
    fn map_intent_status(status: PaymentIntentStatus, has_payment_error: bool) -> IntentStatus {
        match status {
            PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
            PaymentIntentStatus::Canceled => IntentStatus::Canceled,
            PaymentIntentStatus::RequiresPaymentMethod if has_payment_error => IntentStatus::Failed,
            _ => IntentStatus::Pending,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayIntent> {
        let mut params = CreatePaymentIntent::new(amount_minor_units, Self::parse_currency(currency)?);
        params.metadata = Some(metadata);

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe error: {}", e)))?;

        Ok(GatewayIntent {
            intent_id: intent.id.to_string(),
            client_secret: intent.client_secret,
        })
    }

    async fn get_intent_status(&self, intent_id: &str) -> Result<IntentStatus> {
        let id = Self::parse_intent_id(intent_id)?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe error: {}", e)))?;

        Ok(Self::map_intent_status(
            intent.status,
            intent.last_payment_error.is_some(),
        ))
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount_minor_units: Option<i64>,
    ) -> Result<String> {
        let mut params = CreateRefund::new();
        params.payment_intent = Some(Self::parse_intent_id(intent_id)?);
        params.amount = amount_minor_units;

        let refund = Refund::create(&self.client, params)
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe refund error: {}", e)))?;

        Ok(refund.id.to_string())
    }

    fn verify_callback(&self, payload: &str, signature: &str) -> Result<GatewayEvent> {
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret).map_err(
            |e| match e {
                WebhookError::BadSignature => {
                    AppError::BadRequest("Invalid webhook signature".to_string())
                }
                _ => AppError::Gateway(format!("Webhook error: {}", e)),
            },
        )?;

        Ok(match event.type_ {
            EventType::PaymentIntentSucceeded => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    GatewayEvent::IntentSucceeded {
                        intent_id: intent.id.to_string(),
                    }
                } else {
                    GatewayEvent::Ignored
                }
            }
            EventType::PaymentIntentPaymentFailed => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    let reason = intent
                        .last_payment_error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "payment failed".to_string());
                    GatewayEvent::IntentFailed {
                        intent_id: intent.id.to_string(),
                        reason,
                    }
                } else {
                    GatewayEvent::Ignored
                }
            }
            EventType::PaymentIntentCanceled => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    GatewayEvent::IntentCanceled {
                        intent_id: intent.id.to_string(),
                    }
                } else {
                    GatewayEvent::Ignored
                }
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
                GatewayEvent::Ignored
            }
        })
    }
}
