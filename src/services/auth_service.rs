// src/services/auth_service.rs
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt só olha para os primeiros 72 bytes; acima disso recusamos.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Verifica se a senha fornecida corresponde ao hash guardado.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    // Nenhum hash guardado vem de uma senha mais longa, logo não corresponde
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    // bcrypt é lento de propósito; não bloquear o runtime
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verificando hash bcrypt...");
        bcrypt::non_truncating_verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao verificar senha: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Gera um hash bcrypt para uma senha.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Gerando hash bcrypt...");
        bcrypt::non_truncating_hash(&password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao gerar hash: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Limite superior comum a contas e portfolios.
pub fn validate_password_length(password: &str) -> AppResult<()> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(format!(
            "Password must be at most {} bytes.",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Regras mínimas para passwords de conta.
pub fn validate_account_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    validate_password_length(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("Correct horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn verify_against_garbage_hash_is_an_error() {
        let result = verify_password("whatever", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AppError::PasswordHashingError)));
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(validate_account_password("short").is_err());
        assert!(validate_account_password("long enough").is_ok());
    }

    #[test]
    fn rejects_passwords_bcrypt_would_truncate() {
        assert!(validate_password_length(&"a".repeat(72)).is_ok());
        assert!(validate_account_password(&"a".repeat(73)).is_err());
    }

    #[tokio::test]
    async fn bytes_after_the_72nd_still_count() {
        let stored = "a".repeat(72);
        let hash = hash_password(&stored).await.unwrap();
        assert!(verify_password(&stored, &hash).await.unwrap());
        let longer = format!("{}totally-different", stored);
        assert!(!verify_password(&longer, &hash).await.unwrap());
        assert!(hash_password(&format!("{}SECRET-TAIL", stored)).await.is_err());
    }
}
