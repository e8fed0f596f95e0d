// src/web/health_handlers.rs
use crate::{error::AppResult, state::AppState};
use axum::extract::{Json, State};
use serde_json::{json, Value};

// GET /api/health
pub async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.db_pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
