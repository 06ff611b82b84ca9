use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An alternate, finance-reviewed payment request. The state machine is
/// single-shot: Pending moves to exactly one of Approved, Rejected or
/// NeedsInfo, and never moves again. A student asked for more info submits
/// a fresh order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub financial_contact_id: Option<Uuid>,
    /// Pointer to uploaded proof-of-payment; opaque to this system.
    pub evidence_ref: Option<String>,
    pub status: PurchaseOrderStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub decision_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurchaseOrderStatus {
    Pending,
    Approved,
    Rejected,
    NeedsInfo,
}

impl PurchaseOrderStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Reviewer verdict carried in the decide request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurchaseOrderDecision {
    Approved,
    Rejected,
    NeedsInfo,
}

impl From<PurchaseOrderDecision> for PurchaseOrderStatus {
    fn from(decision: PurchaseOrderDecision) -> Self {
        match decision {
            PurchaseOrderDecision::Approved => Self::Approved,
            PurchaseOrderDecision::Rejected => Self::Rejected,
            PurchaseOrderDecision::NeedsInfo => Self::NeedsInfo,
        }
    }
}
