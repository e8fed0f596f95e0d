// src/state.rs
use crate::{config::AppConfig, services::email_service::Mailer};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub mailer: Mailer,
    // Atraso antes da nova tentativa de envio de email
    pub email_retry_delay: Duration,
}

// Permite extrair o pool da DB diretamente
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Arc<AppConfig> {
        state.config.clone()
    }
}
