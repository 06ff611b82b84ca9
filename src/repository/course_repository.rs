use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Course, CourseSession},
    error::{AppError, Result},
    repository::CourseRepository,
};

#[derive(FromRow)]
struct CourseRow {
    id: String,
    title: String,
    description: String,
    price_cents: i64,
    currency: String,
    sessions: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteCourseRepository {
    pool: SqlitePool,
}

impl SqliteCourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_course(row: CourseRow) -> Result<Course> {
        let sessions: Vec<CourseSession> = serde_json::from_str(&row.sessions)
            .map_err(|e| AppError::Database(format!("Invalid session spec JSON: {}", e)))?;
        Ok(Course {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            sessions,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl CourseRepository for SqliteCourseRepository {
    async fn create(&self, course: Course) -> Result<Course> {
        let sessions_json = serde_json::to_string(&course.sessions)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, price_cents, currency, sessions, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(course.id.to_string())
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.price_cents)
        .bind(&course.currency)
        .bind(sessions_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(course.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created course".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT id, title, description, price_cents, currency, sessions, created_at, updated_at
            FROM courses
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_course(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            r#"
            SELECT id, title, description, price_cents, currency, sessions, created_at, updated_at
            FROM courses
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_course).collect()
    }
}
