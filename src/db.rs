// src/db.rs
use crate::error::AppResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration; // Usar std::time::Duration aqui

pub async fn create_db_pool(database_url: &str) -> AppResult<SqlitePool> {
    tracing::info!("Ligando à base de dados: {}", database_url);

    // Opções de conexão (criar se não existir, timeout, chaves estrangeiras)
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
    tracing::info!("Executando migrações da base de dados...");
    // Executa os ficheiros SQL em ./migrations (embebidos na compilação)
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrações concluídas.");
    Ok(())
}

/// Pool em memória com as migrações aplicadas. Uma única conexão, senão
/// cada conexão veria a sua própria base de dados vazia.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
