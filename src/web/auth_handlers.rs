// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{
        InstructorLoginPayload, InstructorProfile, LoginPayload, RegisterInstructorPayload,
        RegisterUserPayload, UserProfile,
    },
    services::{account_service, subscription_service},
    state::AppState,
    web::mw_auth::{InstructorId, UserId, INSTRUCTOR_SESSION_KEY, USER_SESSION_KEY},
};
use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tower_sessions::Session;

/// Novo ID de sessão + guarda o ID da conta.
async fn sign_in(session: &Session, key: &str, account_id: &str) -> AppResult<()> {
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao rodar ID: {}", e)))?;
    session
        .insert(key, account_id)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))
}

async fn sign_out(session: &Session) -> AppResult<()> {
    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao apagar sessão: {}", e)))
}

// --- Pais (Kifolio) ---

// POST /api/auth/register
pub async fn register_user(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterUserPayload>,
) -> AppResult<impl IntoResponse> {
    let user = account_service::create_user(
        &state.db_pool,
        &payload.email,
        &payload.password,
        &payload.name,
        Utc::now(),
    )
    .await?;
    sign_in(&session, USER_SESSION_KEY, &user.id).await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

// POST /api/auth/login
pub async fn login_user(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> AppResult<Json<UserProfile>> {
    tracing::info!("Tentativa de login para: {}", payload.email);
    let user = account_service::authenticate_user(&state.db_pool, &payload.email, &payload.password).await?;
    sign_in(&session, USER_SESSION_KEY, &user.id).await?;
    tracing::info!("✅ Login bem-sucedido para: {}", user.id);
    Ok(Json(user.into()))
}

// POST /api/auth/logout
pub async fn logout(session: Session) -> AppResult<StatusCode> {
    let user_id: Option<String> = session.get(USER_SESSION_KEY).await.ok().flatten();
    sign_out(&session).await?;
    match user_id {
        Some(id) => tracing::info!("🚪 Utilizador '{}' desligado.", id),
        None => tracing::info!("🚪 Sessão desligada."),
    }
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/auth/me
pub async fn current_user(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<UserProfile>> {
    // Aplica um eventual downgrade antes de mostrar o plano
    subscription_service::get_user_plan(&state.db_pool, &user_id, Utc::now()).await?;
    let user = account_service::find_user_by_id(&state.db_pool, &user_id)
        .await?
        .ok_or_else(|| {
            tracing::error!("CRÍTICO: user_id '{}' autenticado não encontrado na DB!", user_id);
            AppError::Unauthorized
        })?;
    Ok(Json(user.into()))
}

// --- Instrutores (Tracker) ---

// POST /api/tracker/auth/register
pub async fn register_instructor(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterInstructorPayload>,
) -> AppResult<impl IntoResponse> {
    let instructor = account_service::create_instructor(
        &state.db_pool,
        &payload.username,
        &payload.password,
        &payload.name,
        Utc::now(),
    )
    .await?;
    sign_in(&session, INSTRUCTOR_SESSION_KEY, &instructor.id).await?;
    Ok((StatusCode::CREATED, Json(InstructorProfile::from(instructor))))
}

// POST /api/tracker/auth/login
pub async fn login_instructor(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<InstructorLoginPayload>,
) -> AppResult<Json<InstructorProfile>> {
    tracing::info!("Tentativa de login de instrutor: {}", payload.username);
    let instructor =
        account_service::authenticate_instructor(&state.db_pool, &payload.username, &payload.password).await?;
    sign_in(&session, INSTRUCTOR_SESSION_KEY, &instructor.id).await?;
    Ok(Json(instructor.into()))
}

// GET /api/tracker/auth/me
pub async fn current_instructor(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
) -> AppResult<Json<InstructorProfile>> {
    let instructor = account_service::find_instructor_by_id(&state.db_pool, &instructor_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(instructor.into()))
}
