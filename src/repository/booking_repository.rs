use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus},
    error::{AppError, Result},
    repository::BookingRepository,
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    student_id: String,
    course_id: String,
    session_id: Option<String>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            course_id: Uuid::parse_str(&row.course_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            session_id: row.session_id,
            status: Self::parse_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<BookingStatus> {
        match s {
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    fn status_to_str(status: &BookingStatus) -> &'static str {
        match status {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, booking: Booking) -> Result<Booking> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO bookings (id, student_id, course_id, session_id, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.student_id.to_string())
        .bind(booking.course_id.to_string())
        .bind(&booking.session_id)
        .bind(Self::status_to_str(&booking.status))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(booking.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, student_id, course_id, session_id, status, created_at, updated_at
            FROM bookings
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Booking> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::status_to_str(&status))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Booking not found".to_string())
        })
    }
}
