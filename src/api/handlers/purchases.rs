use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Enrollment, Payment, PaymentMethod, PaymentStatus, SessionProvision},
    error::{AppError, Result},
    service::{ConfirmationResult, InitiatePurchase, RefundRequest},
};

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    booking_id: Option<Uuid>,
    amount_cents: i64,
    currency: String,
    status: PaymentStatus,
    payment_method: PaymentMethod,
    failure_reason: Option<String>,
    provisioning_note: Option<String>,
    refunded_amount_cents: Option<i64>,
    paid_at: Option<String>,
    created_at: String,
}

impl From<Payment> for PaymentDto {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            user_id: payment.user_id,
            course_id: payment.course_id,
            booking_id: payment.booking_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            payment_method: payment.payment_method,
            failure_reason: payment.failure_reason,
            provisioning_note: payment.provisioning_note,
            refunded_amount_cents: payment.refunded_amount_cents,
            paid_at: payment.paid_at.map(|dt| dt.to_rfc3339()),
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentDto {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    status: crate::domain::EnrollmentStatus,
    progress: i32,
    enrolled_at: String,
}

impl From<Enrollment> for EnrollmentDto {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            id: enrollment.id,
            user_id: enrollment.user_id,
            course_id: enrollment.course_id,
            status: enrollment.status,
            progress: enrollment.progress,
            enrolled_at: enrollment.enrolled_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmationDto {
    payment: PaymentDto,
    enrollment: EnrollmentDto,
    sessions: Vec<SessionProvision>,
    already_confirmed: bool,
}

impl From<ConfirmationResult> for ConfirmationDto {
    fn from(result: ConfirmationResult) -> Self {
        Self {
            payment: result.payment.into(),
            enrollment: result.enrollment.into(),
            sessions: result.sessions,
            already_confirmed: result.already_confirmed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseDto {
    user_id: Uuid,
    course_id: Uuid,
    amount_cents: Option<i64>,
    currency: Option<String>,
    booking_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct InitiatedPurchaseDto {
    payment: PaymentDto,
    client_secret: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreatePurchaseDto>,
) -> Result<(StatusCode, Json<InitiatedPurchaseDto>)> {
    let initiated = state
        .service_context
        .purchase_service
        .initiate(InitiatePurchase {
            user_id: dto.user_id,
            course_id: dto.course_id,
            amount_cents: dto.amount_cents,
            currency: dto.currency,
            booking_id: dto.booking_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiatedPurchaseDto {
            payment: initiated.payment.into(),
            client_secret: initiated.client_secret,
        }),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let payment = state
        .service_context
        .payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    Ok(Json(payment.into()))
}

pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentDto>>> {
    let payments = state
        .service_context
        .payment_repo
        .list_for_user(user_id)
        .await?;

    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// Idempotent confirmation by payment id; used by operators and by
/// clients returning from the gateway redirect. The webhook path below is
/// the usual driver.
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfirmationDto>> {
    let payment = state
        .service_context
        .payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let intent_id = payment.gateway_intent_id.ok_or_else(|| {
        AppError::Conflict("Payment has no gateway intent to confirm".to_string())
    })?;

    let result = state
        .service_context
        .purchase_service
        .confirm(&intent_id)
        .await?;

    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundDto {
    amount_cents: Option<i64>,
    reason: Option<String>,
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<RefundDto>,
) -> Result<Json<PaymentDto>> {
    let payment = state
        .service_context
        .purchase_service
        .refund(
            id,
            RefundRequest {
                amount_cents: dto.amount_cents,
                reason: dto.reason,
            },
        )
        .await?;

    Ok(Json(payment.into()))
}

pub async fn repair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfirmationDto>> {
    let result = state
        .service_context
        .purchase_service
        .repair_provisioning(id)
        .await?;

    Ok(Json(result.into()))
}

pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let payment = state
        .service_context
        .purchase_service
        .sync_with_gateway(id)
        .await?;

    Ok(Json(payment.into()))
}

/// Gateway callback endpoint. Signature verification happens before any
/// state is touched; the event is then applied idempotently.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let gateway = state.gateway.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Payment gateway not configured".to_string())
    })?;

    let signature = headers
        .get(gateway.signature_header())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing webhook signature".to_string()))?;

    let event = gateway.verify_callback(&body, signature)?;
    state
        .service_context
        .purchase_service
        .handle_gateway_event(event)
        .await?;

    Ok(Json(json!({ "received": true })))
}

pub async fn reconcile(State(state): State<AppState>) -> Result<Json<Value>> {
    let repaired = state.service_context.purchase_service.reconcile().await?;

    Ok(Json(json!({
        "repaired": repaired.len(),
        "payments": repaired
            .iter()
            .map(|r| r.payment.id)
            .collect::<Vec<_>>(),
    })))
}
