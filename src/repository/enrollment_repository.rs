use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Enrollment, EnrollmentStatus},
    error::{AppError, Result},
    repository::{is_unique_violation, EnrollmentRepository},
};

#[derive(FromRow)]
struct EnrollmentRow {
    id: String,
    user_id: String,
    course_id: String,
    payment_id: Option<String>,
    status: String,
    progress: i64,
    enrolled_at: NaiveDateTime,
    completion_date: Option<NaiveDateTime>,
    updated_at: NaiveDateTime,
}

pub struct SqliteEnrollmentRepository {
    pool: SqlitePool,
}

impl SqliteEnrollmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_enrollment(row: EnrollmentRow) -> Result<Enrollment> {
        Ok(Enrollment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            course_id: Uuid::parse_str(&row.course_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payment_id: row
                .payment_id
                .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            status: Self::parse_status(&row.status)?,
            progress: row.progress as i32,
            enrolled_at: DateTime::from_naive_utc_and_offset(row.enrolled_at, Utc),
            completion_date: row
                .completion_date
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<EnrollmentStatus> {
        match s {
            "Active" => Ok(EnrollmentStatus::Active),
            "Completed" => Ok(EnrollmentStatus::Completed),
            "Cancelled" => Ok(EnrollmentStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid enrollment status: {}", s))),
        }
    }

    fn status_to_str(status: &EnrollmentStatus) -> &'static str {
        match status {
            EnrollmentStatus::Active => "Active",
            EnrollmentStatus::Completed => "Completed",
            EnrollmentStatus::Cancelled => "Cancelled",
        }
    }
}

#[async_trait]
impl EnrollmentRepository for SqliteEnrollmentRepository {
    async fn create(&self, enrollment: Enrollment) -> Result<Enrollment> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, user_id, course_id, payment_id, status, progress,
                enrolled_at, completion_date, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(enrollment.id.to_string())
        .bind(enrollment.user_id.to_string())
        .bind(enrollment.course_id.to_string())
        .bind(enrollment.payment_id.map(|id| id.to_string()))
        .bind(Self::status_to_str(&enrollment.status))
        .bind(enrollment.progress)
        .bind(now)
        .bind(enrollment.completion_date.map(|dt| dt.naive_utc()))
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(AppError::AlreadyEnrolled),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        self.find_by_id(enrollment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created enrollment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT id, user_id, course_id, payment_id, status, progress,
                   enrolled_at, completion_date, updated_at
            FROM enrollments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_enrollment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_live_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT id, user_id, course_id, payment_id, status, progress,
                   enrolled_at, completion_date, updated_at
            FROM enrollments
            WHERE user_id = ? AND course_id = ?
              AND status IN ('Active', 'Completed')
            "#,
        )
        .bind(user_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_enrollment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT id, user_id, course_id, payment_id, status, progress,
                   enrolled_at, completion_date, updated_at
            FROM enrollments
            WHERE payment_id = ?
            "#,
        )
        .bind(payment_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_enrollment(r)?)),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: EnrollmentStatus,
        completion_date: Option<DateTime<Utc>>,
    ) -> Result<Enrollment> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE enrollments
            SET status = ?,
                completion_date = COALESCE(?, completion_date),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::status_to_str(&status))
        .bind(completion_date.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Enrollment not found".to_string())
        })
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<Enrollment> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE enrollments
            SET progress = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(progress)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Enrollment not found".to_string())
        })
    }
}
