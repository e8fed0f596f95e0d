// src/services/access_service.rs
use crate::{
    models::access::{AccessDecision, AccessType, PasswordGrants, PortfolioAccessRow},
    services::auth_service,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

async fn load_access_row(db_pool: &SqlitePool, portfolio_id: &str) -> Option<PortfolioAccessRow> {
    // Qualquer erro aqui conta como "sem acesso"; não distinguimos
    // "não existe" de "falha na DB" perante quem pede.
    match sqlx::query_as::<_, PortfolioAccessRow>(
        "SELECT user_id, is_private, password_hash FROM portfolios WHERE id = ?1",
    )
    .bind(portfolio_id)
    .fetch_optional(db_pool)
    .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Access: erro ao ler portfolio {}: {:?}", portfolio_id, e);
            None
        }
    }
}

/// Decide se quem pede pode ver o portfolio: público, dono ou autorização
/// por password ainda válida na sessão.
pub async fn check_access(
    db_pool: &SqlitePool,
    viewer_id: Option<&str>,
    grants: &PasswordGrants,
    portfolio_id: &str,
    now: DateTime<Utc>,
) -> AccessDecision {
    let Some(row) = load_access_row(db_pool, portfolio_id).await else {
        tracing::debug!("Access: portfolio {} indisponível, acesso negado.", portfolio_id);
        return AccessDecision::denied();
    };

    if !row.is_private {
        return AccessDecision::granted(AccessType::Public);
    }
    if viewer_id.is_some_and(|viewer| viewer == row.user_id) {
        return AccessDecision::granted(AccessType::Owner);
    }
    if grants.is_valid(portfolio_id, now) {
        return AccessDecision::granted(AccessType::Password);
    }

    tracing::debug!("Access: acesso negado ao portfolio privado {}.", portfolio_id);
    AccessDecision::denied()
}

/// Compara a password com a guardada no portfolio. Se corresponder, grava
/// uma autorização de 24h em `grants`. Erros contam como "não corresponde".
pub async fn verify_password(
    db_pool: &SqlitePool,
    grants: &mut PasswordGrants,
    portfolio_id: &str,
    password: &str,
    now: DateTime<Utc>,
) -> bool {
    let Some(row) = load_access_row(db_pool, portfolio_id).await else {
        return false;
    };
    let Some(stored_hash) = row.password_hash else {
        tracing::debug!("Access: portfolio {} não tem password definida.", portfolio_id);
        return false;
    };

    match auth_service::verify_password(password, &stored_hash).await {
        Ok(true) => {
            grants.grant(portfolio_id, now);
            tracing::info!("🔓 Password correta para portfolio {}.", portfolio_id);
            true
        }
        Ok(false) => {
            tracing::warn!("Password incorreta para portfolio {}.", portfolio_id);
            false
        }
        Err(e) => {
            tracing::error!("Access: erro ao verificar password de {}: {:?}", portfolio_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed(pool: &SqlitePool, is_private: bool, password: Option<&str>) -> String {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO users (id, email, password_hash, name, created_at, updated_at) VALUES ('owner', 'o@example.com', 'x', 'Owner', ?1, ?1)",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        let password_hash = match password {
            Some(pw) => Some(auth_service::hash_password(pw).await.unwrap()),
            None => None,
        };
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO portfolios (id, user_id, child_name, is_private, password_hash, created_at, updated_at)
            VALUES (?1, 'owner', 'Kid', ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(&id)
        .bind(is_private)
        .bind(password_hash)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn public_portfolio_is_visible_to_anyone() {
        let pool = crate::db::test_pool().await;
        let id = seed(&pool, false, None).await;
        let grants = PasswordGrants::default();
        let now = Utc::now();

        for viewer in [None, Some("owner"), Some("stranger")] {
            let decision = check_access(&pool, viewer, &grants, &id, now).await;
            assert_eq!(decision, AccessDecision::granted(AccessType::Public));
        }
    }

    #[tokio::test]
    async fn private_portfolio_is_visible_to_owner_only() {
        let pool = crate::db::test_pool().await;
        let id = seed(&pool, true, None).await;
        let grants = PasswordGrants::default();
        let now = Utc::now();

        let owner = check_access(&pool, Some("owner"), &grants, &id, now).await;
        assert_eq!(owner.access_type, Some(AccessType::Owner));

        assert!(!check_access(&pool, Some("stranger"), &grants, &id, now).await.has_access);
        assert!(!check_access(&pool, None, &grants, &id, now).await.has_access);
    }

    #[tokio::test]
    async fn password_grant_lasts_24_hours() {
        let pool = crate::db::test_pool().await;
        let id = seed(&pool, true, Some("s3cret")).await;
        let mut grants = PasswordGrants::default();
        let now = Utc::now();

        assert!(!verify_password(&pool, &mut grants, &id, "S3cret", now).await);
        assert!(!verify_password(&pool, &mut grants, &id, "s3cret ", now).await);
        assert!(grants.is_empty());

        assert!(verify_password(&pool, &mut grants, &id, "s3cret", now).await);
        let decision = check_access(&pool, None, &grants, &id, now + Duration::hours(1)).await;
        assert_eq!(decision, AccessDecision::granted(AccessType::Password));

        let expired = check_access(&pool, None, &grants, &id, now + Duration::hours(24)).await;
        assert_eq!(expired, AccessDecision::denied());
    }

    #[tokio::test]
    async fn password_sharing_the_first_72_bytes_is_rejected() {
        let pool = crate::db::test_pool().await;
        let prefix = "a".repeat(72);
        let id = seed(&pool, true, Some(&prefix)).await;
        // Hash antigo gerado com truncagem a partir de uma password longa
        let legacy_hash = bcrypt::hash(format!("{}SECRET-TAIL", prefix), 4).unwrap();
        let legacy_id = seed(&pool, true, None).await;
        sqlx::query("UPDATE portfolios SET password_hash = ?1 WHERE id = ?2")
            .bind(&legacy_hash)
            .bind(&legacy_id)
            .execute(&pool)
            .await
            .unwrap();

        let mut grants = PasswordGrants::default();
        let now = Utc::now();
        let impostor = format!("{}totally-different", prefix);

        assert!(!verify_password(&pool, &mut grants, &id, &impostor, now).await);
        assert!(!verify_password(&pool, &mut grants, &legacy_id, &impostor, now).await);
        assert!(grants.is_empty());

        assert!(verify_password(&pool, &mut grants, &id, &prefix, now).await);
    }

    #[tokio::test]
    async fn missing_portfolio_collapses_to_denied() {
        let pool = crate::db::test_pool().await;
        let mut grants = PasswordGrants::default();
        let now = Utc::now();

        assert_eq!(check_access(&pool, Some("owner"), &grants, "nope", now).await, AccessDecision::denied());
        assert!(!verify_password(&pool, &mut grants, "nope", "anything", now).await);

        // Base de dados fechada: também negado, sem erro
        pool.close().await;
        assert_eq!(check_access(&pool, None, &grants, "nope", now).await, AccessDecision::denied());
    }
}
