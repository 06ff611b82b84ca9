mod common;

use uuid::Uuid;

use common::{make_booking, make_course};
use matricula::{
    domain::{
        BookingStatus, EnrollmentStatus, PaymentMethod, PaymentStatus, PurchaseOrderDecision,
        PurchaseOrderStatus,
    },
    error::AppError,
    service::{DecideRequest, SubmitPurchaseOrder},
};

fn submission(student_id: Uuid, course_id: Uuid) -> SubmitPurchaseOrder {
    SubmitPurchaseOrder {
        student_id,
        course_id,
        booking_id: None,
        financial_contact_id: None,
        evidence_ref: Some("upload://po-scan-001".to_string()),
    }
}

fn verdict(decision: PurchaseOrderDecision) -> DecideRequest {
    DecideRequest {
        decision,
        reviewer_id: Uuid::new_v4(),
        notes: None,
        cancel_booking: false,
    }
}

#[tokio::test]
async fn submit_parks_a_pending_order() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    let order = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    assert_eq!(order.status, PurchaseOrderStatus::Pending);
    assert!(order.po_number.starts_with("PO-"));
    assert!(order.reviewed_by.is_none());

    let pending = env.purchase_order_service.list_pending().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, order.id);

    // Submission alone grants nothing.
    assert!(env
        .enrollment_service
        .find_live(student_id, course.id)
        .await?
        .is_none());

    Ok(())
}

#[tokio::test]
async fn submit_rejects_unknown_course() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let err = env
        .purchase_order_service
        .submit(submission(Uuid::new_v4(), Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn one_pending_order_per_student_and_course() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    env.purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    let err = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicatePendingOrder));

    Ok(())
}

#[tokio::test]
async fn approval_settles_payment_and_enrolls() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 2).await?;
    let student_id = Uuid::new_v4();

    let order = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    let decided = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Approved))
        .await?;

    assert_eq!(decided.order.status, PurchaseOrderStatus::Approved);
    assert!(decided.order.reviewed_by.is_some());
    assert!(decided.order.reviewed_at.is_some());

    let confirmation = decided.confirmation.unwrap();
    assert_eq!(confirmation.payment.status, PaymentStatus::Succeeded);
    assert_eq!(confirmation.payment.payment_method, PaymentMethod::PurchaseOrder);
    assert_eq!(confirmation.payment.amount_cents, 40_000);
    assert_eq!(confirmation.payment.purchase_order_id, Some(order.id));
    assert_eq!(confirmation.enrollment.status, EnrollmentStatus::Active);
    assert!(env.schedule_service.is_scheduled(course.id, "s1", student_id).await?);
    assert!(env.schedule_service.is_scheduled(course.id, "s2", student_id).await?);

    Ok(())
}

#[tokio::test]
async fn rejection_leaves_no_trace_beyond_the_order() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();
    let booking = make_booking(&env.bookings, student_id, course.id).await?;

    let mut request = submission(student_id, course.id);
    request.booking_id = Some(booking.id);
    let order = env.purchase_order_service.submit(request).await?;

    let mut reject = verdict(PurchaseOrderDecision::Rejected);
    reject.notes = Some("Unsigned PO document".to_string());
    let decided = env.purchase_order_service.decide(order.id, reject).await?;

    assert_eq!(decided.order.status, PurchaseOrderStatus::Rejected);
    assert_eq!(decided.order.decision_notes.as_deref(), Some("Unsigned PO document"));
    assert!(decided.confirmation.is_none());

    // No payment, no enrollment, and the booking is still open for another
    // payment attempt.
    assert!(env.payments.find_by_purchase_order(order.id).await?.is_none());
    assert!(env
        .enrollment_service
        .find_live(student_id, course.id)
        .await?
        .is_none());
    let booking = env.bookings.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn rejection_can_cancel_the_booking() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();
    let booking = make_booking(&env.bookings, student_id, course.id).await?;

    let mut request = submission(student_id, course.id);
    request.booking_id = Some(booking.id);
    let order = env.purchase_order_service.submit(request).await?;

    let mut reject = verdict(PurchaseOrderDecision::Rejected);
    reject.cancel_booking = true;
    env.purchase_order_service.decide(order.id, reject).await?;

    let booking = env.bookings.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);

    Ok(())
}

#[tokio::test]
async fn an_order_is_decided_exactly_once() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    let order = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    let first = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Approved))
        .await?;
    let enrollment_id = first.confirmation.unwrap().enrollment.id;

    // A retried approval click changes nothing.
    let err = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDecided));

    // A contradictory second verdict changes nothing either.
    let err = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Rejected))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDecided));

    let enrollment = env
        .enrollment_service
        .find_live(student_id, course.id)
        .await?
        .unwrap();
    assert_eq!(enrollment.id, enrollment_id);

    Ok(())
}

#[tokio::test]
async fn needs_info_closes_the_order_without_effects() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    let order = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    let decided = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::NeedsInfo))
        .await?;
    assert_eq!(decided.order.status, PurchaseOrderStatus::NeedsInfo);
    assert!(decided.confirmation.is_none());

    // NeedsInfo is terminal; a later approval must land on a fresh order.
    let err = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDecided));

    // The pending index is free again.
    let resubmitted = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    assert_eq!(resubmitted.status, PurchaseOrderStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn needs_info_applies_the_booking_policy() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;

    // Default policy: the booking stays open for another attempt.
    let student_id = Uuid::new_v4();
    let booking = make_booking(&env.bookings, student_id, course.id).await?;
    let mut request = submission(student_id, course.id);
    request.booking_id = Some(booking.id);
    let order = env.purchase_order_service.submit(request).await?;
    env.purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::NeedsInfo))
        .await?;
    let booking = env.bookings.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    // Caller opts to cancel, same as on a rejection.
    let student_id = Uuid::new_v4();
    let booking = make_booking(&env.bookings, student_id, course.id).await?;
    let mut request = submission(student_id, course.id);
    request.booking_id = Some(booking.id);
    let order = env.purchase_order_service.submit(request).await?;
    let mut needs_info = verdict(PurchaseOrderDecision::NeedsInfo);
    needs_info.cancel_booking = true;
    env.purchase_order_service.decide(order.id, needs_info).await?;
    let booking = env.bookings.find_by_id(booking.id).await?.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);

    Ok(())
}

#[tokio::test]
async fn approval_handoff_is_replayable() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    let order = env
        .purchase_order_service
        .submit(submission(student_id, course.id))
        .await?;
    let decided = env
        .purchase_order_service
        .decide(order.id, verdict(PurchaseOrderDecision::Approved))
        .await?;
    let first = decided.confirmation.unwrap();

    // A crash-and-retry of the decision handler re-runs the handoff with
    // the already-decided order; the PO-keyed payment is found, not
    // recreated.
    let replayed = env
        .purchase_service
        .confirm_from_approval(&decided.order)
        .await?;
    assert!(replayed.already_confirmed);
    assert_eq!(replayed.payment.id, first.payment.id);
    assert_eq!(replayed.enrollment.id, first.enrollment.id);

    Ok(())
}
