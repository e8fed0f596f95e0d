// src/web/public_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        access::{AccessDecision, PasswordGrants, GRANTS_SESSION_KEY},
        portfolio::{PublicPortfolio, VerifyPasswordPayload},
    },
    services::{access_service, portfolio_service},
    state::AppState,
    templates::{PortfolioLockedPage, PortfolioPage},
    web::mw_auth::current_user_id,
};
use askama::Template; // Para render()
use axum::{
    extract::{Form, Json, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

#[derive(Debug, Deserialize)]
pub struct UnlockForm {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LockedQuery {
    pub error: Option<String>,
}

async fn load_grants(session: &Session) -> PasswordGrants {
    session
        .get::<PasswordGrants>(GRANTS_SESSION_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

async fn save_grants(session: &Session, grants: &PasswordGrants) -> AppResult<()> {
    session
        .insert(GRANTS_SESSION_KEY, grants)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao guardar autorizações: {}", e)))
}

/// Resolve o acesso do visitante atual, limpando autorizações expiradas.
async fn resolve_access(
    state: &AppState,
    session: &Session,
    portfolio_id: &str,
    now: DateTime<Utc>,
) -> AppResult<AccessDecision> {
    let viewer_id = current_user_id(session).await;
    let mut grants = load_grants(session).await;
    if grants.prune(now) {
        save_grants(session, &grants).await?;
    }
    Ok(access_service::check_access(&state.db_pool, viewer_id.as_deref(), &grants, portfolio_id, now).await)
}

async fn unlock(state: &AppState, session: &Session, portfolio_id: &str, password: &str) -> AppResult<bool> {
    let mut grants = load_grants(session).await;
    let verified =
        access_service::verify_password(&state.db_pool, &mut grants, portfolio_id, password, Utc::now()).await;
    if verified {
        save_grants(session, &grants).await?;
    }
    Ok(verified)
}

fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template.render().map(Html).map_err(|e| {
        tracing::error!("Falha ao renderizar template: {}", e);
        AppError::InternalServerError
    })
}

// GET /api/public/portfolios/{id}/access
pub async fn get_access(
    State(state): State<AppState>,
    session: Session,
    Path(portfolio_id): Path<String>,
) -> AppResult<Json<AccessDecision>> {
    Ok(Json(resolve_access(&state, &session, &portfolio_id, Utc::now()).await?))
}

// GET /api/public/portfolios/{id}
pub async fn get_public_portfolio(
    State(state): State<AppState>,
    session: Session,
    Path(portfolio_id): Path<String>,
) -> AppResult<Response> {
    let decision = resolve_access(&state, &session, &portfolio_id, Utc::now()).await?;
    if decision.has_access {
        let public: PublicPortfolio = portfolio_service::load_public_portfolio(&state.db_pool, &portfolio_id)
            .await?
            .ok_or(AppError::NotFound)?;
        return Ok(Json(public).into_response());
    }

    let portfolio = portfolio_service::find_portfolio(&state.db_pool, &portfolio_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "This portfolio is private.",
            "requires_password": portfolio.password_hash.is_some(),
        })),
    )
        .into_response())
}

// POST /api/public/portfolios/{id}/verify-password
pub async fn verify_password(
    State(state): State<AppState>,
    session: Session,
    Path(portfolio_id): Path<String>,
    Json(payload): Json<VerifyPasswordPayload>,
) -> AppResult<Json<serde_json::Value>> {
    let verified = unlock(&state, &session, &portfolio_id, &payload.password).await?;
    Ok(Json(json!({ "verified": verified })))
}

// GET /p/{id}
pub async fn show_portfolio_page(
    State(state): State<AppState>,
    session: Session,
    Path(portfolio_id): Path<String>,
    Query(query): Query<LockedQuery>,
) -> AppResult<Html<String>> {
    let decision = resolve_access(&state, &session, &portfolio_id, Utc::now()).await?;
    let portfolio = portfolio_service::find_portfolio(&state.db_pool, &portfolio_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !decision.has_access {
        return render(&PortfolioLockedPage {
            portfolio_id,
            child_name: portfolio.child_name,
            has_password: portfolio.password_hash.is_some(),
            error: query.error,
        });
    }

    let highlights = portfolio_service::list_highlights(&state.db_pool, &portfolio_id).await?;
    let is_owner = current_user_id(&session).await.as_deref() == Some(portfolio.user_id.as_str());
    render(&PortfolioPage {
        portfolio: portfolio.into(),
        highlights,
        is_owner,
    })
}

// POST /p/{id}/unlock
pub async fn unlock_portfolio_page(
    State(state): State<AppState>,
    session: Session,
    Path(portfolio_id): Path<String>,
    Form(form): Form<UnlockForm>,
) -> AppResult<Redirect> {
    if unlock(&state, &session, &portfolio_id, &form.password).await? {
        Ok(Redirect::to(&format!("/p/{}", portfolio_id)))
    } else {
        Ok(Redirect::to(&format!(
            "/p/{}?error={}",
            portfolio_id,
            urlencoding::encode("Incorrect password.")
        )))
    }
}
