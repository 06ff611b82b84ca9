mod common;

use chrono::Utc;
use uuid::Uuid;

use common::make_course;
use matricula::{
    domain::{Course, CourseSession, ProvisionOutcome, TimeBlock},
    error::AppError,
};

#[tokio::test]
async fn first_seat_creates_the_schedule() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let student_id = Uuid::new_v4();

    assert!(env.schedules.find(course.id, "s1").await?.is_none());

    let schedule = env
        .schedule_service
        .provision(course.id, student_id, &course.sessions[0])
        .await?;

    // One delivery flag per time block, all unset; the student holds the
    // only seat.
    assert_eq!(schedule.slots_delivered, vec![false, false]);
    assert_eq!(schedule.roster, vec![student_id]);

    Ok(())
}

#[tokio::test]
async fn later_students_join_the_same_schedule() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let created = env
        .schedule_service
        .provision(course.id, first, &course.sessions[0])
        .await?;
    let joined = env
        .schedule_service
        .provision(course.id, second, &course.sessions[0])
        .await?;

    assert_eq!(joined.id, created.id);
    assert_eq!(joined.roster.len(), 2);
    assert!(joined.roster.contains(&first));
    assert!(joined.roster.contains(&second));

    Ok(())
}

#[tokio::test]
async fn a_seat_is_granted_at_most_once() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let student_id = Uuid::new_v4();

    env.schedule_service
        .provision(course.id, student_id, &course.sessions[0])
        .await?;
    let err = env
        .schedule_service
        .provision(course.id, student_id, &course.sessions[0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyScheduled));

    let schedule = env.schedules.find(course.id, "s1").await?.unwrap();
    assert_eq!(schedule.roster.len(), 1);

    Ok(())
}

#[tokio::test]
async fn provision_all_skips_sessions_without_time_blocks() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let start = Utc::now();
    let course = env
        .courses
        .create(Course {
            id: Uuid::new_v4(),
            title: "Draft-heavy course".to_string(),
            description: "One session is still being planned".to_string(),
            price_cents: 10_000,
            currency: "USD".to_string(),
            sessions: vec![
                CourseSession {
                    session_id: "ready".to_string(),
                    name: "Ready".to_string(),
                    time_blocks: vec![TimeBlock {
                        starts_at: start,
                        ends_at: start + chrono::Duration::hours(1),
                    }],
                },
                CourseSession {
                    session_id: "draft".to_string(),
                    name: "Draft".to_string(),
                    time_blocks: vec![],
                },
            ],
            created_at: start,
            updated_at: start,
        })
        .await?;
    let student_id = Uuid::new_v4();

    let outcomes = env.schedule_service.provision_all(&course, student_id).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].session_id, "ready");
    assert_eq!(outcomes[0].outcome, ProvisionOutcome::Provisioned);
    assert!(env.schedules.find(course.id, "draft").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn repeated_provision_all_reports_already_provisioned() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 2).await?;
    let student_id = Uuid::new_v4();

    env.schedule_service.provision_all(&course, student_id).await;
    let second = env.schedule_service.provision_all(&course, student_id).await;

    assert_eq!(second.len(), 2);
    assert!(second
        .iter()
        .all(|s| s.outcome == ProvisionOutcome::AlreadyProvisioned));

    Ok(())
}

#[tokio::test]
async fn slot_delivery_flags_flip_independently() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let student_id = Uuid::new_v4();

    env.schedule_service
        .provision(course.id, student_id, &course.sessions[0])
        .await?;

    let schedule = env
        .schedule_service
        .mark_slot_delivered(course.id, "s1", 1)
        .await?;
    assert_eq!(schedule.slots_delivered, vec![false, true]);

    // Marking again is harmless.
    let schedule = env
        .schedule_service
        .mark_slot_delivered(course.id, "s1", 1)
        .await?;
    assert_eq!(schedule.slots_delivered, vec![false, true]);

    Ok(())
}

#[tokio::test]
async fn slot_index_is_bounded_by_time_blocks() -> anyhow::Result<()> {
    let env = common::setup().await?;
    let course = make_course(&env.courses, 10_000, 1).await?;
    let student_id = Uuid::new_v4();

    env.schedule_service
        .provision(course.id, student_id, &course.sessions[0])
        .await?;

    let err = env
        .schedule_service
        .mark_slot_delivered(course.id, "s1", 2)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = env
        .schedule_service
        .mark_slot_delivered(course.id, "missing", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}
