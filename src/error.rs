// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Erro de variável de ambiente: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro ao processar password")]
    PasswordHashingError,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    #[error("Pedido inválido: {0}")]
    Validation(String),

    #[error("Conflito: {0}")]
    Conflict(String),

    #[error("Limite do plano atingido: {0}")]
    LimitReached(String),

    #[error("Assinatura de webhook inválida")]
    InvalidSignature,

    #[error("Erro ao enviar email: {0}")]
    Email(String),

    #[error("Não encontrado")]
    NotFound,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Erro interno inesperado")]
    InternalServerError,

    #[error("Não autorizado")]
    Unauthorized,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::LimitReached(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Como converter AppError numa resposta HTTP (JSON `{ "error": "..." }`)
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Erro processado: {:?}", self);
        } else {
            tracing::debug!("Pedido rejeitado ({}): {}", status, self);
        }

        // Detalhes internos nunca chegam ao cliente
        let user_message = match &self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => "Failed to access data.".to_string(),
            AppError::EnvVarError(_) | AppError::Config(_) => "Server misconfigured.".to_string(),
            AppError::PasswordHashingError => "Failed to process credentials.".to_string(),
            AppError::InvalidCredentials => "Invalid email or password.".to_string(),
            AppError::SessionError(_) => "Session error.".to_string(),
            AppError::Validation(msg) | AppError::Conflict(msg) | AppError::LimitReached(msg) => msg.clone(),
            AppError::InvalidSignature => "Invalid webhook signature.".to_string(),
            AppError::Email(_) => "Failed to send email.".to_string(),
            AppError::NotFound => "Not found.".to_string(),
            AppError::Forbidden => "Access denied.".to_string(),
            AppError::Unauthorized => "Authentication required.".to_string(),
            AppError::InternalServerError => "Unexpected error.".to_string(),
        };

        (status, Json(json!({ "error": user_message }))).into_response()
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;
