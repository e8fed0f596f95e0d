// src/web/subscription_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        subscription::{Feature, GateResult, SubscriptionSummary},
        user::UserProfile,
    },
    services::subscription_service,
    state::AppState,
    web::mw_auth::UserId,
};
use axum::extract::{Extension, Json, Path, State};
use chrono::Utc;

// GET /api/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<SubscriptionSummary>> {
    let summary = subscription_service::subscription_summary(&state.db_pool, &user_id, Utc::now()).await?;
    Ok(Json(summary))
}

// POST /api/subscription/start-trial
pub async fn start_trial(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<UserProfile>> {
    let user = subscription_service::start_trial(&state.db_pool, &user_id, Utc::now()).await?;
    Ok(Json(user.into()))
}

// GET /api/subscription/features/{feature}
pub async fn check_feature(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(feature): Path<String>,
) -> AppResult<Json<GateResult>> {
    let feature = feature.parse::<Feature>().map_err(|_| AppError::NotFound)?;
    let gate = subscription_service::can_use_feature(&state.db_pool, &user_id, feature, Utc::now()).await?;
    Ok(Json(gate))
}
