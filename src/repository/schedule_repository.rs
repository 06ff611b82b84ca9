use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::ClassSchedule,
    error::{AppError, Result},
    repository::{is_unique_violation, ScheduleRepository},
};

#[derive(FromRow)]
struct ScheduleRow {
    id: String,
    course_id: String,
    session_id: String,
    slots_delivered: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_roster(&self, schedule_id: &str) -> Result<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT student_id FROM schedule_roster
            WHERE schedule_id = ?
            ORDER BY added_at
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(s,)| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
            .collect()
    }

    async fn row_to_schedule(&self, row: ScheduleRow) -> Result<ClassSchedule> {
        let roster = self.load_roster(&row.id).await?;
        let slots_delivered: Vec<bool> = serde_json::from_str(&row.slots_delivered)
            .map_err(|e| AppError::Database(format!("Invalid slot flags JSON: {}", e)))?;
        Ok(ClassSchedule {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            course_id: Uuid::parse_str(&row.course_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            session_id: row.session_id,
            slots_delivered,
            roster,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn fetch_row(&self, course_id: Uuid, session_id: &str) -> Result<Option<ScheduleRow>> {
        sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, course_id, session_id, slots_delivered, created_at, updated_at
            FROM class_schedules
            WHERE course_id = ? AND session_id = ?
            "#,
        )
        .bind(course_id.to_string())
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn create(&self, schedule: ClassSchedule) -> Result<ClassSchedule> {
        let slots_json = serde_json::to_string(&schedule.slots_delivered)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO class_schedules (id, course_id, session_id, slots_delivered, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schedule.id.to_string())
        .bind(schedule.course_id.to_string())
        .bind(&schedule.session_id)
        .bind(slots_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Conflict(
                    "Schedule already exists for this course session".to_string(),
                ))
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        // Seed the roster in the same pass so first-use creation lands a
        // complete schedule.
        for student in &schedule.roster {
            self.add_student(schedule.id, *student).await?;
        }

        self.find(schedule.course_id, &schedule.session_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created schedule".to_string()))
    }

    async fn find(&self, course_id: Uuid, session_id: &str) -> Result<Option<ClassSchedule>> {
        match self.fetch_row(course_id, session_id).await? {
            Some(row) => Ok(Some(self.row_to_schedule(row).await?)),
            None => Ok(None),
        }
    }

    async fn add_student(&self, schedule_id: Uuid, student_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO schedule_roster (schedule_id, student_id, added_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(schedule_id.to_string())
        .bind(student_id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyScheduled),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn is_scheduled(
        &self,
        course_id: Uuid,
        session_id: &str,
        student_id: Uuid,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM schedule_roster r
            JOIN class_schedules s ON s.id = r.schedule_id
            WHERE s.course_id = ? AND s.session_id = ? AND r.student_id = ?
            "#,
        )
        .bind(course_id.to_string())
        .bind(session_id)
        .bind(student_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn set_slot_delivered(
        &self,
        course_id: Uuid,
        session_id: &str,
        slot_index: usize,
    ) -> Result<ClassSchedule> {
        let row = self.fetch_row(course_id, session_id).await?.ok_or_else(|| {
            AppError::NotFound("Schedule not found for course session".to_string())
        })?;

        let mut flags: Vec<bool> = serde_json::from_str(&row.slots_delivered)
            .map_err(|e| AppError::Database(format!("Invalid slot flags JSON: {}", e)))?;
        if slot_index >= flags.len() {
            return Err(AppError::Validation(format!(
                "Slot index {} out of range for {} time blocks",
                slot_index,
                flags.len()
            )));
        }
        flags[slot_index] = true;

        let slots_json =
            serde_json::to_string(&flags).map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE class_schedules
            SET slots_delivered = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(slots_json)
        .bind(now)
        .bind(&row.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find(course_id, session_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated schedule".to_string())
        })
    }
}
