mod common;

use uuid::Uuid;

use common::make_course;
use matricula::{domain::EnrollmentStatus, error::AppError};

#[tokio::test]
async fn enroll_returns_the_existing_live_row() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let user_id = Uuid::new_v4();

    let first = env.enrollment_service.enroll(user_id, course.id, None).await?;
    let second = env.enrollment_service.enroll(user_id, course.id, None).await?;

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, EnrollmentStatus::Active);

    Ok(())
}

#[tokio::test]
async fn cancelling_frees_the_course_for_reenrollment() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let user_id = Uuid::new_v4();

    let first = env.enrollment_service.enroll(user_id, course.id, None).await?;
    let cancelled = env.enrollment_service.cancel(first.id).await?;
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);

    // Cancelling twice is a no-op, not an error.
    let again = env.enrollment_service.cancel(first.id).await?;
    assert_eq!(again.status, EnrollmentStatus::Cancelled);

    // The live index no longer holds (user, course); a fresh enrollment
    // gets its own row.
    let second = env.enrollment_service.enroll(user_id, course.id, None).await?;
    assert_ne!(second.id, first.id);
    assert_eq!(second.status, EnrollmentStatus::Active);

    Ok(())
}

#[tokio::test]
async fn full_progress_completes_the_enrollment() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let user_id = Uuid::new_v4();

    let enrollment = env.enrollment_service.enroll(user_id, course.id, None).await?;

    let halfway = env.enrollment_service.record_progress(enrollment.id, 50).await?;
    assert_eq!(halfway.status, EnrollmentStatus::Active);
    assert_eq!(halfway.progress, 50);
    assert!(halfway.completion_date.is_none());

    let done = env.enrollment_service.record_progress(enrollment.id, 100).await?;
    assert_eq!(done.status, EnrollmentStatus::Completed);
    assert!(done.completion_date.is_some());

    // Completed still counts as enrolled: no double purchase after finishing.
    assert!(env.enrollment_service.is_enrolled(user_id, course.id).await?);

    Ok(())
}

#[tokio::test]
async fn progress_is_clamped_to_percent_range() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let enrollment = env
        .enrollment_service
        .enroll(Uuid::new_v4(), course.id, None)
        .await?;

    let err = env
        .enrollment_service
        .record_progress(enrollment.id, 101)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = env
        .enrollment_service
        .record_progress(enrollment.id, -1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn cancelled_enrollments_cannot_complete() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let enrollment = env
        .enrollment_service
        .enroll(Uuid::new_v4(), course.id, None)
        .await?;

    env.enrollment_service.cancel(enrollment.id).await?;
    let err = env.enrollment_service.complete(enrollment.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}
