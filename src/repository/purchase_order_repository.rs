use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PurchaseOrder, PurchaseOrderStatus},
    error::{AppError, Result},
    repository::{is_unique_violation, PurchaseOrderRepository},
};

#[derive(FromRow)]
struct PurchaseOrderRow {
    id: String,
    po_number: String,
    student_id: String,
    course_id: String,
    booking_id: Option<String>,
    financial_contact_id: Option<String>,
    evidence_ref: Option<String>,
    status: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<NaiveDateTime>,
    decision_notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePurchaseOrderRepository {
    pool: SqlitePool,
}

impl SqlitePurchaseOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: PurchaseOrderRow) -> Result<PurchaseOrder> {
        let parse = |s: &str| {
            Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
        };
        Ok(PurchaseOrder {
            id: parse(&row.id)?,
            po_number: row.po_number,
            student_id: parse(&row.student_id)?,
            course_id: parse(&row.course_id)?,
            booking_id: row.booking_id.as_deref().map(parse).transpose()?,
            financial_contact_id: row.financial_contact_id.as_deref().map(parse).transpose()?,
            evidence_ref: row.evidence_ref,
            status: Self::parse_status(&row.status)?,
            reviewed_by: row.reviewed_by.as_deref().map(parse).transpose()?,
            reviewed_at: row
                .reviewed_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            decision_notes: row.decision_notes,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<PurchaseOrderStatus> {
        match s {
            "Pending" => Ok(PurchaseOrderStatus::Pending),
            "Approved" => Ok(PurchaseOrderStatus::Approved),
            "Rejected" => Ok(PurchaseOrderStatus::Rejected),
            "NeedsInfo" => Ok(PurchaseOrderStatus::NeedsInfo),
            _ => Err(AppError::Database(format!("Invalid purchase order status: {}", s))),
        }
    }

    fn status_to_str(status: &PurchaseOrderStatus) -> &'static str {
        match status {
            PurchaseOrderStatus::Pending => "Pending",
            PurchaseOrderStatus::Approved => "Approved",
            PurchaseOrderStatus::Rejected => "Rejected",
            PurchaseOrderStatus::NeedsInfo => "NeedsInfo",
        }
    }
}

#[async_trait]
impl PurchaseOrderRepository for SqlitePurchaseOrderRepository {
    async fn create(&self, order: PurchaseOrder) -> Result<PurchaseOrder> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, po_number, student_id, course_id, booking_id,
                financial_contact_id, evidence_ref, status, reviewed_by,
                reviewed_at, decision_notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.to_string())
        .bind(&order.po_number)
        .bind(order.student_id.to_string())
        .bind(order.course_id.to_string())
        .bind(order.booking_id.map(|id| id.to_string()))
        .bind(order.financial_contact_id.map(|id| id.to_string()))
        .bind(&order.evidence_ref)
        .bind(Self::status_to_str(&order.status))
        .bind(order.reviewed_by.map(|id| id.to_string()))
        .bind(order.reviewed_at.map(|dt| dt.naive_utc()))
        .bind(&order.decision_notes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(AppError::DuplicatePendingOrder),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        self.find_by_id(order.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created purchase order".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PurchaseOrder>> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(
            r#"
            SELECT id, po_number, student_id, course_id, booking_id,
                   financial_contact_id, evidence_ref, status, reviewed_by,
                   reviewed_at, decision_notes, created_at, updated_at
            FROM purchase_orders
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> Result<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, PurchaseOrderRow>(
            r#"
            SELECT id, po_number, student_id, course_id, booking_id,
                   financial_contact_id, evidence_ref, status, reviewed_by,
                   reviewed_at, decision_notes, created_at, updated_at
            FROM purchase_orders
            WHERE status = 'Pending'
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn decide(
        &self,
        id: Uuid,
        status: PurchaseOrderStatus,
        reviewer_id: Uuid,
        notes: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let done = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = ?, reviewed_by = ?, reviewed_at = ?,
                decision_notes = ?, updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(Self::status_to_str(&status))
        .bind(reviewer_id.to_string())
        .bind(now)
        .bind(notes)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(done.rows_affected() > 0)
    }
}
