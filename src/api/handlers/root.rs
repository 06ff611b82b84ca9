use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::error::Result;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "matricula",
        "description": "Course purchase and enrollment service",
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await?;

    Ok(Json(json!({
        "status": "ok",
        "gateway_configured": state.gateway.is_some(),
    })))
}
