// src/web/cron_handlers.rs
use crate::{
    error::{AppError, AppResult},
    services::cron_service::{self, CronReport},
    state::AppState,
};
use axum::{
    extract::{Json, State},
    http::{header::AUTHORIZATION, HeaderMap},
};
use chrono::Utc;

/// `Authorization: Bearer <CRON_SECRET>`. Sem segredo configurado, nada passa.
fn authorize(headers: &HeaderMap, cron_secret: &str) -> AppResult<()> {
    if cron_secret.is_empty() {
        tracing::warn!("Cron chamado mas CRON_SECRET não está definida.");
        return Err(AppError::Unauthorized);
    }
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if token == cron_secret => Ok(()),
        _ => {
            tracing::warn!("Cron: token inválido ou em falta.");
            Err(AppError::Unauthorized)
        }
    }
}

// POST /api/cron/trial-reminders
pub async fn trial_reminders(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<CronReport>> {
    authorize(&headers, &state.config.cron_secret)?;
    let report = cron_service::run_trial_reminders(
        &state.db_pool,
        &state.mailer,
        &state.config,
        Utc::now(),
        state.email_retry_delay,
    )
    .await?;
    Ok(Json(report))
}

// POST /api/cron/event-followups
pub async fn event_followups(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<CronReport>> {
    authorize(&headers, &state.config.cron_secret)?;
    let report = cron_service::run_event_followups(
        &state.db_pool,
        &state.mailer,
        &state.config,
        Utc::now(),
        state.email_retry_delay,
    )
    .await?;
    Ok(Json(report))
}
