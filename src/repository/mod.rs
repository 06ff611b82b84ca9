use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod booking_repository;
pub mod course_repository;
pub mod enrollment_repository;
pub mod payment_repository;
pub mod purchase_order_repository;
pub mod schedule_repository;

pub use booking_repository::SqliteBookingRepository;
pub use course_repository::SqliteCourseRepository;
pub use enrollment_repository::SqliteEnrollmentRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use purchase_order_repository::SqlitePurchaseOrderRepository;
pub use schedule_repository::SqliteScheduleRepository;

/// SQLite reports our partial unique indexes and roster primary key as
/// unique violations; repositories translate those into the matching
/// conflict error instead of a generic database failure.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<Payment>>;
    async fn find_by_purchase_order(&self, po_id: Uuid) -> Result<Option<Payment>>;
    /// The in-flight-or-settled payment for (user, course), if any.
    async fn find_live_for_course(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Payment>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>>;
    /// CAS Pending -> Processing, attaching the gateway intent. Fails with
    /// `AlreadyPaid` when another live payment holds the dedup index.
    async fn mark_processing(&self, id: Uuid, intent_id: &str) -> Result<bool>;
    /// CAS {Pending, Processing} -> Succeeded, stamping paid_at.
    async fn mark_succeeded(&self, id: Uuid) -> Result<bool>;
    /// CAS {Pending, Processing} -> Failed with a stored reason.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<bool>;
    /// CAS {Pending, Processing} -> Cancelled (intent voided at the gateway).
    async fn mark_cancelled(&self, id: Uuid) -> Result<bool>;
    /// CAS Succeeded -> Refunded.
    async fn mark_refunded(&self, id: Uuid, refunded_amount_cents: i64) -> Result<bool>;
    async fn set_provisioning_note(&self, id: Uuid, note: Option<&str>) -> Result<()>;
    /// Succeeded payments with no live enrollment: the reconciliation
    /// backlog.
    async fn list_succeeded_without_enrollment(&self) -> Result<Vec<Payment>>;
    /// Refunded payments whose enrollment is still live, as when the
    /// compensating cancellation was lost mid-refund.
    async fn list_refunded_with_live_enrollment(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Fails with `AlreadyEnrolled` when a live enrollment already holds
    /// the (user, course) index; callers treat that as "someone else won
    /// the race" and re-read.
    async fn create(&self, enrollment: Enrollment) -> Result<Enrollment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>>;
    async fn find_live_for_course(&self, user_id: Uuid, course_id: Uuid)
        -> Result<Option<Enrollment>>;
    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Enrollment>>;
    async fn update_status(
        &self,
        id: Uuid,
        status: EnrollmentStatus,
        completion_date: Option<DateTime<Utc>>,
    ) -> Result<Enrollment>;
    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<Enrollment>;
}

#[async_trait]
pub trait PurchaseOrderRepository: Send + Sync {
    /// Fails with `DuplicatePendingOrder` when the student already has a
    /// pending order for the course.
    async fn create(&self, order: PurchaseOrder) -> Result<PurchaseOrder>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PurchaseOrder>>;
    async fn list_pending(&self) -> Result<Vec<PurchaseOrder>>;
    /// CAS Pending -> decided. Returns false when the order was already
    /// decided (by this caller's retry or by a concurrent reviewer).
    async fn decide(
        &self,
        id: Uuid,
        status: PurchaseOrderStatus,
        reviewer_id: Uuid,
        notes: Option<&str>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: Booking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Booking>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: Course) -> Result<Course>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>>;
    async fn list(&self) -> Result<Vec<Course>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Fails with `Conflict` when a schedule for (course, session) already
    /// exists; the provisioner re-reads and falls through to a seat grant.
    async fn create(&self, schedule: ClassSchedule) -> Result<ClassSchedule>;
    async fn find(&self, course_id: Uuid, session_id: &str) -> Result<Option<ClassSchedule>>;
    /// Grants a seat. Fails with `AlreadyScheduled` on a duplicate roster
    /// entry; never inserts twice.
    async fn add_student(&self, schedule_id: Uuid, student_id: Uuid) -> Result<()>;
    async fn is_scheduled(&self, course_id: Uuid, session_id: &str, student_id: Uuid)
        -> Result<bool>;
    async fn set_slot_delivered(
        &self,
        course_id: Uuid,
        session_id: &str,
        slot_index: usize,
    ) -> Result<ClassSchedule>;
}
