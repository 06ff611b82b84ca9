use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::handlers::purchases::ConfirmationDto,
    api::state::AppState,
    domain::{PurchaseOrder, PurchaseOrderDecision, PurchaseOrderStatus},
    error::Result,
    service::{DecideRequest, SubmitPurchaseOrder},
};

#[derive(Debug, Serialize)]
pub struct PurchaseOrderDto {
    id: Uuid,
    po_number: String,
    student_id: Uuid,
    course_id: Uuid,
    booking_id: Option<Uuid>,
    status: PurchaseOrderStatus,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<String>,
    decision_notes: Option<String>,
    created_at: String,
}

impl From<PurchaseOrder> for PurchaseOrderDto {
    fn from(order: PurchaseOrder) -> Self {
        Self {
            id: order.id,
            po_number: order.po_number,
            student_id: order.student_id,
            course_id: order.course_id,
            booking_id: order.booking_id,
            status: order.status,
            reviewed_by: order.reviewed_by,
            reviewed_at: order.reviewed_at.map(|dt| dt.to_rfc3339()),
            decision_notes: order.decision_notes,
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitDto {
    student_id: Uuid,
    course_id: Uuid,
    booking_id: Option<Uuid>,
    financial_contact_id: Option<Uuid>,
    evidence_ref: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(dto): Json<SubmitDto>,
) -> Result<(StatusCode, Json<PurchaseOrderDto>)> {
    let order = state
        .service_context
        .purchase_order_service
        .submit(SubmitPurchaseOrder {
            student_id: dto.student_id,
            course_id: dto.course_id,
            booking_id: dto.booking_id,
            financial_contact_id: dto.financial_contact_id,
            evidence_ref: dto.evidence_ref,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrderDto>> {
    let order = state.service_context.purchase_order_service.get(id).await?;
    Ok(Json(order.into()))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<PurchaseOrderDto>>> {
    let orders = state
        .service_context
        .purchase_order_service
        .list_pending()
        .await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct DecideDto {
    decision: PurchaseOrderDecision,
    reviewer_id: Uuid,
    notes: Option<String>,
    #[serde(default)]
    cancel_booking: bool,
}

#[derive(Debug, Serialize)]
pub struct DecisionDto {
    order: PurchaseOrderDto,
    confirmation: Option<ConfirmationDto>,
}

pub async fn decide(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<DecideDto>,
) -> Result<Json<DecisionDto>> {
    let result = state
        .service_context
        .purchase_order_service
        .decide(
            id,
            DecideRequest {
                decision: dto.decision,
                reviewer_id: dto.reviewer_id,
                notes: dto.notes,
                cancel_booking: dto.cancel_booking,
            },
        )
        .await?;

    Ok(Json(DecisionDto {
        order: result.order.into(),
        confirmation: result.confirmation.map(Into::into),
    }))
}
