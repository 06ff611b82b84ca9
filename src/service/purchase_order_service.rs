use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        BookingStatus, PurchaseOrder, PurchaseOrderDecision, PurchaseOrderStatus,
    },
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    repository::{BookingRepository, CourseRepository, PurchaseOrderRepository},
    service::purchase_service::{ConfirmationResult, PurchaseService},
};

#[derive(Debug, Clone)]
pub struct SubmitPurchaseOrder {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub financial_contact_id: Option<Uuid>,
    pub evidence_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecideRequest {
    pub decision: PurchaseOrderDecision,
    pub reviewer_id: Uuid,
    pub notes: Option<String>,
    /// Caller policy for the linked booking on a non-approval: cancel it,
    /// or leave it Pending for another payment attempt.
    pub cancel_booking: bool,
}

#[derive(Debug, Clone)]
pub struct DecisionResult {
    pub order: PurchaseOrder,
    /// Present only for approvals.
    pub confirmation: Option<ConfirmationResult>,
}

/// The human-reviewed payment path. Submission parks a Pending order;
/// a finance reviewer decides it exactly once. Approval hands off to the
/// purchase coordinator for the same effects as a settled gateway charge.
pub struct PurchaseOrderService {
    orders: Arc<dyn PurchaseOrderRepository>,
    bookings: Arc<dyn BookingRepository>,
    courses: Arc<dyn CourseRepository>,
    purchases: Arc<PurchaseService>,
    notifications: Arc<NotificationManager>,
}

impl PurchaseOrderService {
    pub fn new(
        orders: Arc<dyn PurchaseOrderRepository>,
        bookings: Arc<dyn BookingRepository>,
        courses: Arc<dyn CourseRepository>,
        purchases: Arc<PurchaseService>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            orders,
            bookings,
            courses,
            purchases,
            notifications,
        }
    }

    fn generate_po_number() -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..=0xFFFF);
        format!("PO-{}-{:04X}", Utc::now().format("%Y%m%d"), suffix)
    }

    pub async fn submit(&self, request: SubmitPurchaseOrder) -> Result<PurchaseOrder> {
        // Unknown courses are a validation failure, not a reviewable order.
        if self.courses.find_by_id(request.course_id).await?.is_none() {
            return Err(AppError::NotFound("Course not found".to_string()));
        }

        let order = self
            .orders
            .create(PurchaseOrder {
                id: Uuid::new_v4(),
                po_number: Self::generate_po_number(),
                student_id: request.student_id,
                course_id: request.course_id,
                booking_id: request.booking_id,
                financial_contact_id: request.financial_contact_id,
                evidence_ref: request.evidence_ref,
                status: PurchaseOrderStatus::Pending,
                reviewed_by: None,
                reviewed_at: None,
                decision_notes: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        if let Some(booking_id) = order.booking_id {
            if let Err(e) = self
                .bookings
                .update_status(booking_id, BookingStatus::Pending)
                .await
            {
                tracing::warn!("Failed to mark booking {} pending: {}", booking_id, e);
            }
        }

        self.notifications
            .dispatch(NotificationEvent::PurchaseOrderSubmitted {
                order: order.clone(),
            })
            .await;

        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> Result<PurchaseOrder> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order not found".to_string()))
    }

    pub async fn list_pending(&self) -> Result<Vec<PurchaseOrder>> {
        self.orders.list_pending().await
    }

    /// Applies a reviewer verdict. The Pending -> decided transition is a
    /// conditional update, so a retried approval click (or two racing
    /// reviewers) resolves to exactly one applied decision; everyone else
    /// gets `AlreadyDecided` and no second enrollment can exist.
    pub async fn decide(&self, po_id: Uuid, request: DecideRequest) -> Result<DecisionResult> {
        let order = self
            .orders
            .find_by_id(po_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order not found".to_string()))?;

        if order.status.is_decided() {
            return Err(AppError::AlreadyDecided);
        }

        let applied = self
            .orders
            .decide(
                po_id,
                request.decision.into(),
                request.reviewer_id,
                request.notes.as_deref(),
            )
            .await?;
        if !applied {
            return Err(AppError::AlreadyDecided);
        }

        let order = self
            .orders
            .find_by_id(po_id)
            .await?
            .ok_or_else(|| AppError::Internal("Purchase order vanished after decision".to_string()))?;

        let confirmation = match request.decision {
            PurchaseOrderDecision::Approved => {
                Some(self.purchases.confirm_from_approval(&order).await?)
            }
            // Both non-approvals close this order (a NeedsInfo'd student
            // resubmits with better evidence) and apply the caller's
            // booking policy: cancel it, or leave it Pending for another
            // payment attempt.
            PurchaseOrderDecision::Rejected | PurchaseOrderDecision::NeedsInfo => {
                if let Some(booking_id) = order.booking_id {
                    let target = if request.cancel_booking {
                        BookingStatus::Cancelled
                    } else {
                        BookingStatus::Pending
                    };
                    if let Err(e) = self.bookings.update_status(booking_id, target).await {
                        tracing::warn!("Failed to update booking {}: {}", booking_id, e);
                    }
                }
                None
            }
        };

        self.notifications
            .dispatch(NotificationEvent::PurchaseOrderDecided {
                order: order.clone(),
            })
            .await;

        tracing::info!(
            "Purchase order {} decided {:?} by {}",
            order.po_number,
            order.status,
            request.reviewer_id
        );

        Ok(DecisionResult {
            order,
            confirmation,
        })
    }
}
