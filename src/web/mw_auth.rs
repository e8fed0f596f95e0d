// src/web/mw_auth.rs
use crate::error::AppError;
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

pub const USER_SESSION_KEY: &str = "user_id";
pub const INSTRUCTOR_SESSION_KEY: &str = "instructor_id";

// Guardados nas extensões da requisição pelos middlewares abaixo
#[derive(Clone, Debug)]
pub struct UserId(pub String);

#[derive(Clone, Debug)]
pub struct InstructorId(pub String);

async fn session_id_for(session: &Session, key: &str) -> Result<Option<String>, AppError> {
    session.get::<String>(key).await.map_err(|e| {
        tracing::error!("Autenticação MW: Erro ao ler sessão: {:?}", e);
        AppError::SessionError(format!("Erro ao verificar sessão: {}", e))
    })
}

/// ID do pai/mãe autenticado, se houver (para rotas públicas).
pub async fn current_user_id(session: &Session) -> Option<String> {
    session.get::<String>(USER_SESSION_KEY).await.ok().flatten()
}

// Middleware que exige um pai/mãe autenticado (produto Kifolio)
pub async fn require_user(session: Session, mut request: Request, next: Next) -> Result<Response, AppError> {
    match session_id_for(&session, USER_SESSION_KEY).await? {
        Some(user_id) => {
            tracing::debug!("Autenticação MW: Utilizador '{}' autenticado.", user_id);
            request.extensions_mut().insert(UserId(user_id));
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!("Autenticação MW: Não autenticado (sem user_id).");
            Err(AppError::Unauthorized)
        }
    }
}

// Middleware que exige um instrutor autenticado (produto Tracker)
pub async fn require_instructor(session: Session, mut request: Request, next: Next) -> Result<Response, AppError> {
    match session_id_for(&session, INSTRUCTOR_SESSION_KEY).await? {
        Some(instructor_id) => {
            tracing::debug!("Autenticação MW: Instrutor '{}' autenticado.", instructor_id);
            request.extensions_mut().insert(InstructorId(instructor_id));
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!("Autenticação MW: Não autenticado (sem instructor_id).");
            Err(AppError::Unauthorized)
        }
    }
}
