// src/main.rs

// --- Declaração dos Módulos ---
mod config;
mod db;
mod error;
mod models;
mod services;
mod state;
mod templates;
mod web;

// --- Imports ---
use crate::{config::AppConfig, services::email_service, state::AppState};
use axum::serve;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::Key, ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Chave de assinatura dos cookies: 64 bytes derivados de SESSION_SECRET.
fn session_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuração do Logging (Tracing) ---
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer())
        .init();

    tracing::info!("🚀 Iniciando servidor Kifolio...");

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Configuração inválida: {}", e))?;

    // --- Configuração da Base de Dados ---
    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Falha crítica ao inicializar a base de dados: {}", e);
            return Err(anyhow::anyhow!("Falha ao conectar/migrar DB: {}", e));
        }
    };

    // --- Configuração das Sessões ---
    // `sessions` não está livre: guarda as sessões (aulas) dos programas
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("tower_sessions")
        .map_err(|e| anyhow::anyhow!("Falha ao criar session store: {}", e))?;
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Falha ao migrar session store: {}", e))?;

    let session_store_clone = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = session_store_clone
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Erro na task de limpeza de sessões: {:?}", e);
        }
    });
    tracing::info!("🧹 Tarefa de limpeza de sessões iniciada.");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.secure_cookies)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_signed(session_key(&config.session_secret));

    tracing::info!("🔑 Camada de sessão configurada.");

    // --- Criação do Estado da Aplicação ---
    let bind_addr = config.bind_addr;
    let app_state = AppState {
        db_pool,
        mailer: email_service::Mailer::from_config(&config),
        config: Arc::new(config),
        email_retry_delay: email_service::DEFAULT_RETRY_DELAY,
    };

    // --- Configuração do Endereço e Listener ---
    tracing::info!("📡 Servidor escutando em http://{}", bind_addr);
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Falha ao iniciar listener em {}: {}", bind_addr, e);
            return Err(e.into());
        }
    };

    // --- Criação do Router e Aplicação das Camadas (Middlewares) ---
    let app = web::routes::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    );

    // --- Início do Servidor ---
    tracing::info!("👂 Servidor pronto para aceitar conexões...");
    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Erro fatal no servidor: {}", e);
        return Err(e.into());
    }

    Ok(())
}
