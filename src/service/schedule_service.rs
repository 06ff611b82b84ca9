use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{ClassSchedule, Course, CourseSession, ProvisionOutcome, SessionProvision},
    error::{AppError, Result},
    repository::ScheduleRepository,
};

/// Seats enrolled students into per-session class schedules, creating the
/// schedule and its per-time-block delivery ledger lazily on first use.
pub struct ScheduleService {
    repo: Arc<dyn ScheduleRepository>,
}

impl ScheduleService {
    pub fn new(repo: Arc<dyn ScheduleRepository>) -> Self {
        Self { repo }
    }

    /// Adds one student to one session's roster. Fails with
    /// `AlreadyScheduled` when the student already holds the seat; bulk
    /// callers treat that as a log-only outcome.
    pub async fn provision(
        &self,
        course_id: Uuid,
        student_id: Uuid,
        session: &CourseSession,
    ) -> Result<ClassSchedule> {
        if let Some(schedule) = self.repo.find(course_id, &session.session_id).await? {
            self.repo.add_student(schedule.id, student_id).await?;
            return self
                .repo
                .find(course_id, &session.session_id)
                .await?
                .ok_or_else(|| AppError::Internal("Schedule vanished after seat grant".to_string()));
        }

        let schedule = ClassSchedule {
            id: Uuid::new_v4(),
            course_id,
            session_id: session.session_id.clone(),
            // One delivery flag per time block, nothing delivered yet.
            slots_delivered: vec![false; session.time_blocks.len()],
            roster: vec![student_id],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        match self.repo.create(schedule).await {
            Ok(created) => Ok(created),
            // Lost the creation race: the other writer's schedule exists
            // now, so fall through to a plain seat grant on it.
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .repo
                    .find(course_id, &session.session_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("Schedule vanished after unique conflict".to_string())
                    })?;
                self.repo.add_student(existing.id, student_id).await?;
                self.repo
                    .find(course_id, &session.session_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("Schedule vanished after seat grant".to_string())
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Provisions every schedulable session of a course for one student.
    /// Partial success is the norm, not an error: each session reports its
    /// own outcome and a failure in one never blocks the rest.
    pub async fn provision_all(
        &self,
        course: &Course,
        student_id: Uuid,
    ) -> Vec<SessionProvision> {
        let mut results = Vec::new();

        for session in course.sessions.iter().filter(|s| s.is_schedulable()) {
            let outcome = match self.provision(course.id, student_id, session).await {
                Ok(_) => ProvisionOutcome::Provisioned,
                Err(AppError::AlreadyScheduled) => {
                    tracing::debug!(
                        "Student {} already seated in session {} of course {}",
                        student_id,
                        session.session_id,
                        course.id
                    );
                    ProvisionOutcome::AlreadyProvisioned
                }
                Err(e) => {
                    tracing::warn!(
                        "Provisioning session {} of course {} for student {} failed: {}",
                        session.session_id,
                        course.id,
                        student_id,
                        e
                    );
                    ProvisionOutcome::Failed(e.to_string())
                }
            };
            results.push(SessionProvision {
                session_id: session.session_id.clone(),
                outcome,
            });
        }

        results
    }

    pub async fn is_scheduled(
        &self,
        course_id: Uuid,
        session_id: &str,
        student_id: Uuid,
    ) -> Result<bool> {
        self.repo.is_scheduled(course_id, session_id, student_id).await
    }

    /// Flips one time block to delivered. Downstream feedback collection
    /// only opens for delivered slots.
    pub async fn mark_slot_delivered(
        &self,
        course_id: Uuid,
        session_id: &str,
        slot_index: usize,
    ) -> Result<ClassSchedule> {
        self.repo
            .set_slot_delivered(course_id, session_id, slot_index)
            .await
    }
}
