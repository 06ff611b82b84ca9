use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{Enrollment, EnrollmentStatus},
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    repository::EnrollmentRepository,
};

/// Single source of truth for "is this user enrolled in this course".
pub struct EnrollmentService {
    repo: Arc<dyn EnrollmentRepository>,
    notifications: Arc<NotificationManager>,
}

impl EnrollmentService {
    pub fn new(
        repo: Arc<dyn EnrollmentRepository>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self { repo, notifications }
    }

    pub async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        Ok(self.repo.find_live_for_course(user_id, course_id).await?.is_some())
    }

    pub async fn find_live(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        self.repo.find_live_for_course(user_id, course_id).await
    }

    pub async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Enrollment>> {
        self.repo.find_by_payment(payment_id).await
    }

    /// Idempotent enrollment. Once a payment has settled this must not fail
    /// loudly: if a live enrollment already exists (this confirmation lost
    /// a race, or is a retry) it is returned unchanged.
    pub async fn enroll(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        payment_id: Option<Uuid>,
    ) -> Result<Enrollment> {
        if let Some(existing) = self.repo.find_live_for_course(user_id, course_id).await? {
            return Ok(existing);
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            payment_id,
            status: EnrollmentStatus::Active,
            progress: 0,
            enrolled_at: Utc::now(),
            completion_date: None,
            updated_at: Utc::now(),
        };

        match self.repo.create(enrollment).await {
            Ok(created) => {
                self.notifications
                    .dispatch(NotificationEvent::EnrollmentCreated {
                        enrollment: created.clone(),
                    })
                    .await;
                Ok(created)
            }
            // A concurrent confirmation won the insert; its row satisfies
            // the invariant, so adopt it.
            Err(AppError::AlreadyEnrolled) => self
                .repo
                .find_live_for_course(user_id, course_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("Enrollment vanished after unique conflict".to_string())
                }),
            Err(e) => Err(e),
        }
    }

    pub async fn cancel(&self, enrollment_id: Uuid) -> Result<Enrollment> {
        let enrollment = self
            .repo
            .find_by_id(enrollment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

        if enrollment.status == EnrollmentStatus::Cancelled {
            return Ok(enrollment);
        }

        self.repo
            .update_status(enrollment_id, EnrollmentStatus::Cancelled, None)
            .await
    }

    pub async fn complete(&self, enrollment_id: Uuid) -> Result<Enrollment> {
        let enrollment = self
            .repo
            .find_by_id(enrollment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

        if enrollment.status == EnrollmentStatus::Completed {
            return Ok(enrollment);
        }
        if enrollment.status == EnrollmentStatus::Cancelled {
            return Err(AppError::Conflict(
                "Cannot complete a cancelled enrollment".to_string(),
            ));
        }

        self.repo
            .update_status(enrollment_id, EnrollmentStatus::Completed, Some(Utc::now()))
            .await
    }

    /// Records course progress; hitting 100 completes the enrollment.
    pub async fn record_progress(&self, enrollment_id: Uuid, progress: i32) -> Result<Enrollment> {
        if !(0..=100).contains(&progress) {
            return Err(AppError::Validation(format!(
                "Progress must be between 0 and 100, got {}",
                progress
            )));
        }

        let updated = self.repo.update_progress(enrollment_id, progress).await?;
        if progress >= 100 && updated.status == EnrollmentStatus::Active {
            return self.complete(enrollment_id).await;
        }
        Ok(updated)
    }
}
