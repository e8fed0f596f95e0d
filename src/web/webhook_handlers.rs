// src/web/webhook_handlers.rs
use crate::{
    error::{AppError, AppResult},
    services::webhook_service,
    state::AppState,
};
use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use chrono::Utc;
use serde_json::{json, Value};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

// POST /api/stripe/webhook
// O corpo tem de chegar intacto: a assinatura é calculada sobre os bytes exatos.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook sem header {}.", SIGNATURE_HEADER);
            AppError::InvalidSignature
        })?;

    let now = Utc::now();
    let event = webhook_service::construct_event(&body, signature, &state.config.stripe_webhook_secret, now)?;

    // Falhas no processamento devolvem 500 para a Stripe voltar a tentar
    webhook_service::handle_event(&state.db_pool, &event, now)
        .await
        .map_err(|e| {
            tracing::error!("❌ Webhook '{}' ({}) falhou: {}", event.event_type, event.id, e);
            AppError::InternalServerError
        })?;

    Ok(Json(json!({ "received": true })))
}
