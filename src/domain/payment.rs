use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt to pay for one (user, course) pair.
///
/// At most one payment per (user, course) may sit in Processing or
/// Succeeded at a time; the `idx_payments_live` partial index backs that
/// invariant, applications only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub booking_id: Option<Uuid>,
    /// Set on approval-path payments; unique, so a retried approval finds
    /// the payment it already created instead of charging twice.
    pub purchase_order_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub gateway_intent_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Operator-visible record of provisioning steps that failed after the
    /// charge settled. Cleared once a repair pass succeeds.
    pub provisioning_note: Option<String>,
    pub refunded_amount_cents: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }

    /// States that count against the one-live-payment guard.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Processing | Self::Succeeded)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Gateway,
    PurchaseOrder,
}
