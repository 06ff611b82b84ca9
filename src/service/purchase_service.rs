use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingStatus, Course, Enrollment, Payment, PaymentMethod, PaymentStatus,
        PurchaseOrder, SessionProvision,
    },
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    payments::{GatewayEvent, IntentStatus, PaymentGateway},
    repository::{BookingRepository, CourseRepository, PaymentRepository},
    service::{EnrollmentService, ScheduleService},
};

#[derive(Debug, Clone)]
pub struct InitiatePurchase {
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// Price override in minor units; defaults to the course price.
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct InitiatedPurchase {
    pub payment: Payment,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmationResult {
    pub payment: Payment,
    pub enrollment: Enrollment,
    pub sessions: Vec<SessionProvision>,
    /// True when this call observed an already-applied confirmation and
    /// returned its result instead of re-running effects.
    pub already_confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RefundRequest {
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
}

/// Orchestrates the direct-payment path and the post-payment effects both
/// payment paths converge on: enrollment, seat provisioning, booking
/// confirmation, notification fan-out.
///
/// The money-side invariants live in the datastore (partial unique indexes,
/// conditional updates); this service sequences the calls and decides which
/// failures are fatal. The one rule it never breaks: once a charge has
/// settled, nothing rolls the payment back. Downstream failures become an
/// operator-visible provisioning note instead.
pub struct PurchaseService {
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<EnrollmentService>,
    schedules: Arc<ScheduleService>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifications: Arc<NotificationManager>,
    gateway_timeout: Duration,
}

impl PurchaseService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<EnrollmentService>,
        schedules: Arc<ScheduleService>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: Arc<NotificationManager>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            payments,
            bookings,
            courses,
            enrollments,
            schedules,
            gateway,
            notifications,
            gateway_timeout,
        }
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("Payment gateway not configured".to_string())
        })
    }

    async fn course(&self, course_id: Uuid) -> Result<Course> {
        self.courses
            .find_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    /// Eligibility checks, a Pending payment row, a gateway intent, then a
    /// CAS promotion to Processing. Nothing here is visible to other users
    /// until confirmation. A gateway timeout leaves the row Pending so a
    /// reconciliation poll (or a fresh attempt after the intent expires)
    /// can resolve it.
    pub async fn initiate(&self, request: InitiatePurchase) -> Result<InitiatedPurchase> {
        if self
            .payments
            .find_live_for_course(request.user_id, request.course_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyPaid);
        }
        if self
            .enrollments
            .is_enrolled(request.user_id, request.course_id)
            .await?
        {
            return Err(AppError::AlreadyEnrolled);
        }

        let course = self.course(request.course_id).await?;
        let amount_cents = request.amount_cents.unwrap_or(course.price_cents);
        let currency = request.currency.unwrap_or_else(|| course.currency.clone());
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "Resolved price must be positive, got {}",
                amount_cents
            )));
        }

        let gateway = self.gateway()?.clone();

        let payment = self
            .payments
            .create(Payment {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                course_id: request.course_id,
                booking_id: request.booking_id,
                purchase_order_id: None,
                amount_cents,
                currency: currency.clone(),
                status: PaymentStatus::Pending,
                payment_method: PaymentMethod::Gateway,
                gateway_intent_id: None,
                failure_reason: None,
                provisioning_note: None,
                refunded_amount_cents: None,
                paid_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        let mut metadata = HashMap::new();
        metadata.insert("payment_id".to_string(), payment.id.to_string());
        metadata.insert("user_id".to_string(), request.user_id.to_string());
        metadata.insert("course_id".to_string(), request.course_id.to_string());

        let intent = match tokio::time::timeout(
            self.gateway_timeout,
            gateway.create_intent(amount_cents, &currency, metadata),
        )
        .await
        {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => {
                // A definite gateway refusal: close this attempt out so a
                // fresh initiation can retry with a new payment.
                let reason = e.to_string();
                self.payments.mark_failed(payment.id, &reason).await?;
                if let Some(failed) = self.payments.find_by_id(payment.id).await? {
                    self.notifications
                        .dispatch(NotificationEvent::PaymentFailed { payment: failed })
                        .await;
                }
                return Err(e);
            }
            Err(_) => {
                // Timed out mid-call: no intent id was ever recorded, so
                // the customer cannot complete this attempt. The row stays
                // Pending, which does not block a fresh initiation; sync
                // closes it out as Failed if an operator gets there first.
                tracing::warn!(
                    "Gateway intent creation timed out for payment {}; leaving Pending",
                    payment.id
                );
                return Err(AppError::Gateway(
                    "Payment gateway timed out; retry the purchase".to_string(),
                ));
            }
        };

        if !self
            .payments
            .mark_processing(payment.id, &intent.intent_id)
            .await?
        {
            return Err(AppError::Conflict(
                "Payment state changed during initiation".to_string(),
            ));
        }

        let payment = self
            .payments
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment vanished after initiation".to_string()))?;

        tracing::info!(
            "Initiated payment {} (intent {}) for user {} course {}",
            payment.id,
            intent.intent_id,
            request.user_id,
            request.course_id
        );

        Ok(InitiatedPurchase {
            payment,
            client_secret: intent.client_secret,
        })
    }

    /// Settles the payment the gateway reported as charged and applies the
    /// post-payment effects. Idempotent per intent id: duplicate webhook
    /// deliveries and concurrent confirmations all resolve to the same
    /// result, with effects applied at most once.
    pub async fn confirm(&self, intent_id: &str) -> Result<ConfirmationResult> {
        let payment = self
            .payments
            .find_by_intent(intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Unknown payment intent".to_string()))?;

        if payment.status == PaymentStatus::Succeeded {
            return self.already_confirmed_result(payment).await;
        }
        if payment.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Payment is {:?} and cannot be confirmed",
                payment.status
            )));
        }

        if !self.payments.mark_succeeded(payment.id).await? {
            // Lost the CAS. If a concurrent confirm won, hand back its
            // result; anything else is a real conflict.
            let current = self
                .payments
                .find_by_id(payment.id)
                .await?
                .ok_or_else(|| AppError::Internal("Payment vanished during confirm".to_string()))?;
            if current.status == PaymentStatus::Succeeded {
                return self.already_confirmed_result(current).await;
            }
            return Err(AppError::Conflict(format!(
                "Payment is {:?} and cannot be confirmed",
                current.status
            )));
        }

        let payment = self
            .payments
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment vanished during confirm".to_string()))?;

        self.apply_confirmation_effects(payment, false).await
    }

    /// The same post-payment effects, triggered by an approved purchase
    /// order instead of a gateway charge. The PO id is the idempotency key:
    /// a crash-and-retry of the decision handler finds the payment it
    /// already created and replays only the idempotent effects.
    pub async fn confirm_from_approval(&self, order: &PurchaseOrder) -> Result<ConfirmationResult> {
        if let Some(existing) = self.payments.find_by_purchase_order(order.id).await? {
            return self.apply_confirmation_effects(existing, true).await;
        }

        let course = self.course(order.course_id).await?;
        if course.price_cents <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "Course price must be positive, got {}",
                course.price_cents
            )));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: order.student_id,
            course_id: order.course_id,
            booking_id: order.booking_id,
            purchase_order_id: Some(order.id),
            amount_cents: course.price_cents,
            currency: course.currency.clone(),
            status: PaymentStatus::Succeeded,
            payment_method: PaymentMethod::PurchaseOrder,
            gateway_intent_id: None,
            failure_reason: None,
            provisioning_note: None,
            refunded_amount_cents: None,
            paid_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let payment = match self.payments.create(payment).await {
            Ok(created) => created,
            Err(AppError::AlreadyPaid) => {
                // Either this PO's payment landed on a previous attempt, or
                // a gateway payment for the same (user, course) is live.
                match self.payments.find_by_purchase_order(order.id).await? {
                    Some(existing) => existing,
                    None => return Err(AppError::AlreadyPaid),
                }
            }
            Err(e) => return Err(e),
        };

        self.apply_confirmation_effects(payment, false).await
    }

    /// Refunds a settled payment and cancels the enrollment it bought.
    /// Roster history stays untouched for attendance and audit. The
    /// gateway call happens before the CAS commit point and holds no
    /// datastore lock while it waits.
    pub async fn refund(&self, payment_id: Uuid, request: RefundRequest) -> Result<Payment> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::Conflict(format!(
                "Only succeeded payments can be refunded (status: {:?})",
                payment.status
            )));
        }

        let amount_cents = request.amount_cents.unwrap_or(payment.amount_cents);
        if amount_cents <= 0 || amount_cents > payment.amount_cents {
            return Err(AppError::InvalidAmount(format!(
                "Refund amount must be within (0, {}], got {}",
                payment.amount_cents, amount_cents
            )));
        }

        if let Some(intent_id) = &payment.gateway_intent_id {
            let gateway = self.gateway()?.clone();
            let refund_id = tokio::time::timeout(
                self.gateway_timeout,
                gateway.create_refund(intent_id, Some(amount_cents)),
            )
            .await
            .map_err(|_| AppError::Gateway("Refund call timed out".to_string()))??;
            tracing::info!("Gateway refund {} issued for payment {}", refund_id, payment.id);
        }

        if !self.payments.mark_refunded(payment.id, amount_cents).await? {
            return Err(AppError::Conflict(
                "Payment was modified while the refund was in flight".to_string(),
            ));
        }

        if let Some(reason) = &request.reason {
            tracing::info!("Refund reason for payment {}: {}", payment.id, reason);
        }

        // Compensating action: the refunded purchase no longer grants
        // access.
        let enrollment = match self.enrollment_for_payment(&payment).await? {
            Some(e) => Some(self.enrollments.cancel(e.id).await?),
            None => None,
        };
        if enrollment.is_none() {
            tracing::warn!("No enrollment found to cancel for refunded payment {}", payment.id);
        }

        let refunded = self
            .payments
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment vanished during refund".to_string()))?;

        self.notifications
            .dispatch(NotificationEvent::PaymentRefunded {
                payment: refunded.clone(),
            })
            .await;

        Ok(refunded)
    }

    /// Replays the idempotent post-payment effects for a settled payment
    /// whose provisioning previously failed in part. Never re-charges.
    pub async fn repair_provisioning(&self, payment_id: Uuid) -> Result<ConfirmationResult> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::Conflict(format!(
                "Only succeeded payments can be repaired (status: {:?})",
                payment.status
            )));
        }

        self.apply_confirmation_effects(payment, true).await
    }

    /// Polls the gateway for a payment stuck before settlement. The
    /// gateway may confirm long after the original caller gave up; this is
    /// how that late confirmation lands.
    pub async fn sync_with_gateway(&self, payment_id: Uuid) -> Result<Payment> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        let intent_id = match (&payment.status, &payment.gateway_intent_id) {
            (PaymentStatus::Pending | PaymentStatus::Processing, Some(intent)) => intent.clone(),
            (PaymentStatus::Pending, None) => {
                // Intent creation never completed, so no customer holds a
                // client secret for this row. Nothing can settle it; close
                // it out.
                self.payments
                    .mark_failed(payment.id, "No gateway intent was recorded")
                    .await?;
                return self
                    .payments
                    .find_by_id(payment.id)
                    .await?
                    .ok_or_else(|| AppError::Internal("Payment vanished during sync".to_string()));
            }
            (PaymentStatus::Processing, None) => {
                return Err(AppError::Conflict(
                    "Payment has no gateway intent to poll".to_string(),
                ))
            }
            _ => return Ok(payment),
        };

        let gateway = self.gateway()?.clone();
        let status = tokio::time::timeout(
            self.gateway_timeout,
            gateway.get_intent_status(&intent_id),
        )
        .await
        .map_err(|_| AppError::Gateway("Status poll timed out".to_string()))??;

        match status {
            IntentStatus::Succeeded => {
                let result = self.confirm(&intent_id).await?;
                Ok(result.payment)
            }
            IntentStatus::Failed => {
                self.payments
                    .mark_failed(payment.id, "Charge failed at gateway")
                    .await?;
                let failed = self
                    .payments
                    .find_by_id(payment.id)
                    .await?
                    .ok_or_else(|| AppError::Internal("Payment vanished during sync".to_string()))?;
                self.notifications
                    .dispatch(NotificationEvent::PaymentFailed {
                        payment: failed.clone(),
                    })
                    .await;
                Ok(failed)
            }
            IntentStatus::Canceled => {
                self.payments.mark_cancelled(payment.id).await?;
                self.payments
                    .find_by_id(payment.id)
                    .await?
                    .ok_or_else(|| AppError::Internal("Payment vanished during sync".to_string()))
            }
            IntentStatus::Pending => Ok(payment),
        }
    }

    /// Applies a verified gateway callback event.
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::IntentSucceeded { intent_id } => {
                self.confirm(&intent_id).await?;
            }
            GatewayEvent::IntentFailed { intent_id, reason } => {
                if let Some(payment) = self.payments.find_by_intent(&intent_id).await? {
                    if self.payments.mark_failed(payment.id, &reason).await? {
                        if let Some(failed) = self.payments.find_by_id(payment.id).await? {
                            self.notifications
                                .dispatch(NotificationEvent::PaymentFailed { payment: failed })
                                .await;
                        }
                    }
                } else {
                    tracing::warn!("Failure event for unknown intent {}", intent_id);
                }
            }
            GatewayEvent::IntentCanceled { intent_id } => {
                if let Some(payment) = self.payments.find_by_intent(&intent_id).await? {
                    self.payments.mark_cancelled(payment.id).await?;
                }
            }
            GatewayEvent::Ignored => {}
        }
        Ok(())
    }

    /// Finds settled payments that never produced a live enrollment and
    /// replays their effects, then the converse: refunded payments whose
    /// enrollment cancellation was lost mid-refund. The repair loop behind
    /// "money received, provisioning incomplete".
    pub async fn reconcile(&self) -> Result<Vec<ConfirmationResult>> {
        let backlog = self.payments.list_succeeded_without_enrollment().await?;
        let mut repaired = Vec::new();

        for payment in backlog {
            let id = payment.id;
            match self.apply_confirmation_effects(payment, true).await {
                Ok(result) => repaired.push(result),
                Err(e) => {
                    tracing::error!("Reconciliation failed for payment {}: {}", id, e);
                }
            }
        }

        for payment in self.payments.list_refunded_with_live_enrollment().await? {
            match self.enrollment_for_payment(&payment).await? {
                Some(enrollment) => {
                    if let Err(e) = self.enrollments.cancel(enrollment.id).await {
                        tracing::error!(
                            "Failed to cancel enrollment {} for refunded payment {}: {}",
                            enrollment.id,
                            payment.id,
                            e
                        );
                    } else {
                        tracing::info!(
                            "Cancelled enrollment {} left live by refunded payment {}",
                            enrollment.id,
                            payment.id
                        );
                    }
                }
                None => {
                    tracing::warn!(
                        "Refunded payment {} reported a live enrollment that vanished",
                        payment.id
                    );
                }
            }
        }

        Ok(repaired)
    }

    /// Enrollments carry the payment that bought them; fall back to the
    /// (user, course) lookup for rows created by a replay.
    async fn enrollment_for_payment(&self, payment: &Payment) -> Result<Option<Enrollment>> {
        if let Some(enrollment) = self.enrollments.find_by_payment(payment.id).await? {
            return Ok(Some(enrollment));
        }
        self.enrollments
            .find_live(payment.user_id, payment.course_id)
            .await
    }

    async fn already_confirmed_result(&self, payment: Payment) -> Result<ConfirmationResult> {
        if let Some(enrollment) = self
            .enrollments
            .find_live(payment.user_id, payment.course_id)
            .await?
        {
            return Ok(ConfirmationResult {
                payment,
                enrollment,
                sessions: Vec::new(),
                already_confirmed: true,
            });
        }
        // Succeeded but never enrolled: an earlier confirmation crashed
        // between the CAS and the effects. Replaying here is the repair.
        self.apply_confirmation_effects(payment, true).await
    }

    /// The convergence point of both payment paths. Every step in here is
    /// idempotent, and none of them can undo the settled payment.
    async fn apply_confirmation_effects(
        &self,
        payment: Payment,
        replay: bool,
    ) -> Result<ConfirmationResult> {
        let enrollment = self
            .enrollments
            .enroll(payment.user_id, payment.course_id, Some(payment.id))
            .await?;

        let (sessions, note) = match self.courses.find_by_id(payment.course_id).await? {
            Some(course) => {
                let sessions = self.schedules.provision_all(&course, payment.user_id).await;
                let failures: Vec<String> = sessions
                    .iter()
                    .filter(|s| s.is_failure())
                    .map(|s| s.session_id.clone())
                    .collect();
                let note = if failures.is_empty() {
                    None
                } else {
                    Some(format!("Provisioning failed for sessions: {}", failures.join(", ")))
                };
                (sessions, note)
            }
            None => (
                Vec::new(),
                Some("Course definition missing at provisioning time".to_string()),
            ),
        };

        self.payments
            .set_provisioning_note(payment.id, note.as_deref())
            .await?;
        if let Some(note) = &note {
            tracing::warn!("Payment {}: {}", payment.id, note);
        }

        if let Some(booking_id) = payment.booking_id {
            if let Err(e) = self.confirm_booking(booking_id).await {
                tracing::warn!("Failed to confirm booking {}: {}", booking_id, e);
            }
        }

        let payment = self
            .payments
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment vanished after confirmation".to_string()))?;

        if !replay {
            self.notifications
                .dispatch(NotificationEvent::PaymentSucceeded {
                    payment: payment.clone(),
                })
                .await;
        }

        Ok(ConfirmationResult {
            payment,
            enrollment,
            sessions,
            already_confirmed: replay,
        })
    }

    async fn confirm_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.bookings
            .update_status(booking_id, BookingStatus::Confirmed)
            .await
    }
}
