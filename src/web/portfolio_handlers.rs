// src/web/portfolio_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::portfolio::{
        CreatePortfolioPayload, EmailPreferences, EmailPreferencesPayload, Highlight, HighlightPayload,
        InvitationPayload, PortfolioView, UpdatePortfolioPayload, TEMPLATES,
    },
    services::{
        account_service,
        email_service::{self, EmailKind},
        portfolio_service,
    },
    state::AppState,
    web::mw_auth::UserId,
};
use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

// GET /api/templates
pub async fn list_templates() -> impl IntoResponse {
    Json(TEMPLATES)
}

// GET /api/portfolios
pub async fn list_portfolios(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<Vec<PortfolioView>>> {
    let portfolios = portfolio_service::list_portfolios(&state.db_pool, &user_id).await?;
    Ok(Json(portfolios.into_iter().map(PortfolioView::from).collect()))
}

// POST /api/portfolios
pub async fn create_portfolio(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<CreatePortfolioPayload>,
) -> AppResult<impl IntoResponse> {
    let portfolio = portfolio_service::create_portfolio(&state.db_pool, &user_id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(PortfolioView::from(portfolio))))
}

// GET /api/portfolios/{id}
pub async fn get_portfolio(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
) -> AppResult<Json<PortfolioView>> {
    let portfolio = portfolio_service::get_owned_portfolio(&state.db_pool, &user_id, &portfolio_id).await?;
    Ok(Json(portfolio.into()))
}

// PUT /api/portfolios/{id}
pub async fn update_portfolio(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
    Json(payload): Json<UpdatePortfolioPayload>,
) -> AppResult<Json<PortfolioView>> {
    let portfolio =
        portfolio_service::update_portfolio(&state.db_pool, &user_id, &portfolio_id, payload, Utc::now()).await?;
    Ok(Json(portfolio.into()))
}

// DELETE /api/portfolios/{id}
pub async fn delete_portfolio(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
) -> AppResult<StatusCode> {
    portfolio_service::delete_portfolio(&state.db_pool, &user_id, &portfolio_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/portfolios/{id}/highlights
pub async fn list_highlights(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
) -> AppResult<Json<Vec<Highlight>>> {
    portfolio_service::get_owned_portfolio(&state.db_pool, &user_id, &portfolio_id).await?;
    let highlights = portfolio_service::list_highlights(&state.db_pool, &portfolio_id).await?;
    Ok(Json(highlights))
}

// POST /api/portfolios/{id}/highlights
pub async fn create_highlight(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
    Json(payload): Json<HighlightPayload>,
) -> AppResult<impl IntoResponse> {
    let highlight =
        portfolio_service::create_highlight(&state.db_pool, &user_id, &portfolio_id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(highlight)))
}

// PUT /api/highlights/{id}
pub async fn update_highlight(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(highlight_id): Path<String>,
    Json(payload): Json<HighlightPayload>,
) -> AppResult<Json<Highlight>> {
    let highlight =
        portfolio_service::update_highlight(&state.db_pool, &user_id, &highlight_id, payload, Utc::now()).await?;
    Ok(Json(highlight))
}

// DELETE /api/highlights/{id}
pub async fn delete_highlight(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(highlight_id): Path<String>,
) -> AppResult<StatusCode> {
    portfolio_service::delete_highlight(&state.db_pool, &user_id, &highlight_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/portfolios/{id}/invitations
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(portfolio_id): Path<String>,
    Json(payload): Json<InvitationPayload>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let invitation =
        portfolio_service::create_invitation(&state.db_pool, &user_id, &portfolio_id, &payload.email, now).await?;

    let inviter = account_service::find_user_by_id(&state.db_pool, &user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let portfolio = portfolio_service::get_owned_portfolio(&state.db_pool, &user_id, &portfolio_id).await?;
    let message = email_service::invitation_email(
        &invitation.email,
        &inviter.name,
        &portfolio.child_name,
        &state.config.portfolio_url(&portfolio_id),
        &invitation.token,
    )?;

    // Melhor esforço: o convite fica criado mesmo que o email falhe
    let email_sent = email_service::send_with_retry(
        &state.db_pool,
        &state.mailer,
        &message,
        EmailKind::Invitation,
        state.email_retry_delay,
    )
    .await
    .is_ok();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "invitation": invitation, "email_sent": email_sent })),
    ))
}

// GET /api/email-preferences
pub async fn get_email_preferences(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<EmailPreferences>> {
    let prefs = portfolio_service::get_email_preferences(&state.db_pool, &user_id, Utc::now()).await?;
    Ok(Json(prefs))
}

// PUT /api/email-preferences
pub async fn update_email_preferences(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<EmailPreferencesPayload>,
) -> AppResult<Json<EmailPreferences>> {
    let prefs = portfolio_service::update_email_preferences(&state.db_pool, &user_id, payload, Utc::now()).await?;
    Ok(Json(prefs))
}
