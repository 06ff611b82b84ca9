use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    repository::{is_unique_violation, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    course_id: String,
    booking_id: Option<String>,
    purchase_order_id: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    payment_method: String,
    gateway_intent_id: Option<String>,
    failure_reason: Option<String>,
    provisioning_note: Option<String>,
    refunded_amount_cents: Option<i64>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const PAYMENT_COLUMNS: &str = r#"
    id, user_id, course_id, booking_id, purchase_order_id, amount_cents,
    currency, status, payment_method, gateway_intent_id, failure_reason,
    provisioning_note, refunded_amount_cents, paid_at, created_at, updated_at
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            course_id: parse_uuid(&row.course_id)?,
            booking_id: row.booking_id.as_deref().map(parse_uuid).transpose()?,
            purchase_order_id: row.purchase_order_id.as_deref().map(parse_uuid).transpose()?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: Self::parse_status(&row.status)?,
            payment_method: Self::parse_method(&row.payment_method)?,
            gateway_intent_id: row.gateway_intent_id,
            failure_reason: row.failure_reason,
            provisioning_note: row.provisioning_note,
            refunded_amount_cents: row.refunded_amount_cents,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Processing" => Ok(PaymentStatus::Processing),
            "Succeeded" => Ok(PaymentStatus::Succeeded),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn status_to_str(status: &PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Succeeded => "Succeeded",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    fn parse_method(s: &str) -> Result<PaymentMethod> {
        match s {
            "Gateway" => Ok(PaymentMethod::Gateway),
            "PurchaseOrder" => Ok(PaymentMethod::PurchaseOrder),
            _ => Err(AppError::Database(format!("Invalid payment method: {}", s))),
        }
    }

    fn method_to_str(method: &PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::Gateway => "Gateway",
            PaymentMethod::PurchaseOrder => "PurchaseOrder",
        }
    }

    async fn fetch_one_where(&self, clause: &str, bind: String) -> Result<Option<Payment>> {
        let query = format!(
            "SELECT {} FROM payments WHERE {}",
            PAYMENT_COLUMNS, clause
        );
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, course_id, booking_id, purchase_order_id,
                amount_cents, currency, status, payment_method,
                gateway_intent_id, failure_reason, provisioning_note,
                refunded_amount_cents, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.user_id.to_string())
        .bind(payment.course_id.to_string())
        .bind(payment.booking_id.map(|id| id.to_string()))
        .bind(payment.purchase_order_id.map(|id| id.to_string()))
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(Self::status_to_str(&payment.status))
        .bind(Self::method_to_str(&payment.payment_method))
        .bind(&payment.gateway_intent_id)
        .bind(&payment.failure_reason)
        .bind(&payment.provisioning_note)
        .bind(payment.refunded_amount_cents)
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(AppError::AlreadyPaid),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        self.fetch_one_where("id = ?", id.to_string()).await
    }

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<Payment>> {
        self.fetch_one_where("gateway_intent_id = ?", intent_id.to_string())
            .await
    }

    async fn find_by_purchase_order(&self, po_id: Uuid) -> Result<Option<Payment>> {
        self.fetch_one_where("purchase_order_id = ?", po_id.to_string())
            .await
    }

    async fn find_live_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments
            WHERE user_id = ? AND course_id = ?
              AND status IN ('Processing', 'Succeeded')
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(user_id.to_string())
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn mark_processing(&self, id: Uuid, intent_id: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Processing', gateway_intent_id = ?, updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(intent_id)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            // The dedup index rejected the promotion: another payment for
            // the same (user, course) is already live.
            Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyPaid),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn mark_succeeded(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Succeeded', paid_at = ?, updated_at = ?
            WHERE id = ? AND status IN ('Pending', 'Processing')
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyPaid),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let done = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Failed', failure_reason = ?, updated_at = ?
            WHERE id = ? AND status IN ('Pending', 'Processing')
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(done.rows_affected() > 0)
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let done = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Cancelled', updated_at = ?
            WHERE id = ? AND status IN ('Pending', 'Processing')
            "#,
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(done.rows_affected() > 0)
    }

    async fn mark_refunded(&self, id: Uuid, refunded_amount_cents: i64) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let done = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'Refunded', refunded_amount_cents = ?, updated_at = ?
            WHERE id = ? AND status = 'Succeeded'
            "#,
        )
        .bind(refunded_amount_cents)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(done.rows_affected() > 0)
    }

    async fn set_provisioning_note(&self, id: Uuid, note: Option<&str>) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE payments
            SET provisioning_note = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(note)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_succeeded_without_enrollment(&self) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments p
            WHERE p.status = 'Succeeded'
              AND NOT EXISTS (
                  SELECT 1 FROM enrollments e
                  WHERE e.user_id = p.user_id
                    AND e.course_id = p.course_id
                    AND e.status IN ('Active', 'Completed')
              )
            ORDER BY p.created_at
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn list_refunded_with_live_enrollment(&self) -> Result<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {} FROM payments p
            WHERE p.status = 'Refunded'
              AND EXISTS (
                  SELECT 1 FROM enrollments e
                  WHERE e.user_id = p.user_id
                    AND e.course_id = p.course_id
                    AND e.status IN ('Active', 'Completed')
              )
            ORDER BY p.created_at
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
