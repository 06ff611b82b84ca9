use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

pub mod stripe_gateway;

pub use stripe_gateway::StripeGateway;

/// Handle returned by intent creation. The client secret goes back to the
/// caller so their frontend can finish the charge; the intent id is what we
/// key confirmation on.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub intent_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    /// Gateway still waiting on the payer.
    Pending,
    Succeeded,
    Canceled,
    Failed,
}

/// A verified gateway callback, reduced to what the purchase core acts on.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    IntentSucceeded { intent_id: String },
    IntentFailed { intent_id: String, reason: String },
    IntentCanceled { intent_id: String },
    /// Event types the core does not care about.
    Ignored,
}

/// The four operations the purchase core needs from a payment processor.
/// Nothing outside implementations of this trait assumes a wire format.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayIntent>;

    async fn get_intent_status(&self, intent_id: &str) -> Result<IntentStatus>;

    /// Returns the gateway-side refund id.
    async fn create_refund(
        &self,
        intent_id: &str,
        amount_minor_units: Option<i64>,
    ) -> Result<String>;

    /// Verifies a callback signature and maps the payload to a
    /// `GatewayEvent`.
    fn verify_callback(&self, payload: &str, signature: &str) -> Result<GatewayEvent>;

    /// HTTP header carrying the callback signature.
    fn signature_header(&self) -> &'static str {
        "Stripe-Signature"
    }
}
