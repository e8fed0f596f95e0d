// src/models/access.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Duração de uma autorização obtida por password.
pub const GRANT_TTL_HOURS: i64 = 24;

/// Chave da sessão onde ficam as autorizações por password.
pub const GRANTS_SESSION_KEY: &str = "portfolio_grants";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Public,
    Owner,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub has_access: bool,
    pub access_type: Option<AccessType>,
}

impl AccessDecision {
    pub fn granted(access_type: AccessType) -> Self {
        Self {
            has_access: true,
            access_type: Some(access_type),
        }
    }

    pub fn denied() -> Self {
        Self {
            has_access: false,
            access_type: None,
        }
    }
}

/// Autorizações por password guardadas na sessão: portfolio id -> expiração.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordGrants(HashMap<String, DateTime<Utc>>);

impl PasswordGrants {
    pub fn grant(&mut self, portfolio_id: &str, now: DateTime<Utc>) {
        self.0
            .insert(portfolio_id.to_string(), now + Duration::hours(GRANT_TTL_HOURS));
    }

    pub fn is_valid(&self, portfolio_id: &str, now: DateTime<Utc>) -> bool {
        self.0
            .get(portfolio_id)
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Remove as autorizações expiradas. Devolve true se alguma foi removida.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.0.len();
        self.0.retain(|_, expires_at| *expires_at > now);
        self.0.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Colunas lidas para decidir o acesso a um portfolio.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortfolioAccessRow {
    pub user_id: String,
    pub is_private: bool,
    pub password_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_expires_after_24_hours() {
        let now = Utc::now();
        let mut grants = PasswordGrants::default();
        grants.grant("p1", now);

        assert!(grants.is_valid("p1", now));
        assert!(grants.is_valid("p1", now + Duration::hours(23)));
        assert!(!grants.is_valid("p1", now + Duration::hours(24)));
        assert!(!grants.is_valid("p2", now));
    }

    #[test]
    fn prune_drops_only_expired_grants() {
        let now = Utc::now();
        let mut grants = PasswordGrants::default();
        grants.grant("old", now - Duration::hours(30));
        grants.grant("fresh", now);

        assert!(grants.prune(now));
        assert!(grants.is_valid("fresh", now));
        assert!(!grants.prune(now));
    }
}
