// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr};

pub const DEFAULT_LOG_FILTER: &str =
    "kifolio_server=debug,tower_http=info,sqlx=warn,tower_sessions=info";

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub bind_addr: SocketAddr,
    pub app_url: String,
    pub stripe_webhook_secret: String,
    pub cron_secret: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;
        let session_secret = env::var("SESSION_SECRET")?;
        if session_secret.len() < 64 {
            tracing::warn!("⚠️ SESSION_SECRET é curta, considere usar uma chave mais longa e aleatória!");
        }

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".into())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR inválido: {}", e)))?;

        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        if stripe_webhook_secret.is_empty() {
            tracing::warn!("⚠️ STRIPE_WEBHOOK_SECRET não definida: todos os webhooks serão rejeitados.");
        }

        let cron_secret = env::var("CRON_SECRET").unwrap_or_default();
        if cron_secret.is_empty() {
            tracing::warn!("⚠️ CRON_SECRET não definida: endpoints de cron desativados.");
        }

        Ok(Self {
            database_url,
            session_secret,
            bind_addr,
            app_url: env::var("APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            stripe_webhook_secret,
            cron_secret,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Kifolio <hello@kifolio.com>".into()),
            secure_cookies: env::var("SESSION_SECURE_COOKIE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }

    /// Link público partilhável de um portfolio.
    pub fn portfolio_url(&self, portfolio_id: &str) -> String {
        format!("{}/p/{}", self.app_url, portfolio_id)
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            session_secret: "x".repeat(64),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            app_url: "http://localhost:3000".into(),
            stripe_webhook_secret: "whsec_test_secret".into(),
            cron_secret: "cron-test-secret".into(),
            resend_api_key: None,
            email_from: "Kifolio <hello@kifolio.com>".into(),
            secure_cookies: false,
        }
    }
}
