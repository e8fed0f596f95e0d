// src/services/account_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{Instructor, User},
    services::auth_service,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id, email, password_hash, name, subscription_plan, subscription_status,
    trial_started_at, trial_ends_at, subscription_ends_at,
    stripe_customer_id, stripe_subscription_id, trial_reminder_sent_at,
    created_at, updated_at
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    // Validação simples; o link de confirmação fica fora do âmbito
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("A valid email address is required.".into())),
    }
}

/// Busca um pai/mãe pelo ID.
pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    tracing::debug!("Buscando utilizador por ID: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
        .bind(email.trim())
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

/// Cria um pai/mãe no plano gratuito, com as preferências de email por omissão.
pub async fn create_user(
    db_pool: &SqlitePool,
    email: &str,
    raw_password: &str,
    name: &str,
    now: DateTime<Utc>,
) -> AppResult<User> {
    let email = normalize_email(email)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required.".into()));
    }
    auth_service::validate_account_password(raw_password)?;

    tracing::info!("Tentando criar utilizador: {}", email);
    let password_hash = auth_service::hash_password(raw_password).await?;
    let id = Uuid::new_v4().to_string();

    // Utilizador + preferências na mesma transação
    let mut tx = db_pool.begin().await?;

    let insert = sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, subscription_plan, subscription_status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, 'free', 'inactive', ?5, ?5)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(name)
    .bind(now)
    .execute(&mut *tx)
    .await;

    if let Err(e) = &insert {
        if is_unique_violation(e) {
            tracing::warn!("Falha ao criar utilizador: email '{}' já existe.", email);
            tx.rollback().await?;
            return Err(AppError::Conflict("An account with this email already exists.".into()));
        }
    }
    insert?;

    sqlx::query(
        r#"
        INSERT INTO email_preferences (user_id, trial_reminders, event_followups, marketing, updated_at)
        VALUES (?1, 1, 1, 0, ?2)
        "#,
    )
    .bind(&id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("✅ Utilizador '{}' criado com sucesso.", email);

    find_user_by_id(db_pool, &id)
        .await?
        .ok_or(AppError::InternalServerError)
}

/// Verifica email + password. Devolve o utilizador se as credenciais forem válidas.
pub async fn authenticate_user(db_pool: &SqlitePool, email: &str, password: &str) -> AppResult<User> {
    let Some(user) = find_user_by_email(db_pool, email).await? else {
        tracing::warn!("Utilizador não encontrado: {}", email);
        return Err(AppError::InvalidCredentials);
    };
    if auth_service::verify_password(password, &user.password_hash).await? {
        Ok(user)
    } else {
        tracing::warn!("Senha incorreta para: {}", email);
        Err(AppError::InvalidCredentials)
    }
}

// --- Instrutores ---

pub async fn find_instructor_by_id(db_pool: &SqlitePool, id: &str) -> AppResult<Option<Instructor>> {
    let instructor = sqlx::query_as::<_, Instructor>(
        "SELECT id, username, password_hash, name, created_at FROM instructors WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(db_pool)
    .await?;
    Ok(instructor)
}

pub async fn find_instructor_by_username(
    db_pool: &SqlitePool,
    username: &str,
) -> AppResult<Option<Instructor>> {
    let instructor = sqlx::query_as::<_, Instructor>(
        "SELECT id, username, password_hash, name, created_at FROM instructors WHERE username = ?1",
    )
    .bind(username.trim())
    .fetch_optional(db_pool)
    .await?;
    Ok(instructor)
}

pub async fn create_instructor(
    db_pool: &SqlitePool,
    username: &str,
    raw_password: &str,
    name: &str,
    now: DateTime<Utc>,
) -> AppResult<Instructor> {
    let username = username.trim();
    let name = name.trim();
    if username.is_empty() || username.contains(char::is_whitespace) {
        return Err(AppError::Validation("Username must be non-empty and contain no spaces.".into()));
    }
    if name.is_empty() {
        return Err(AppError::Validation("Name is required.".into()));
    }
    auth_service::validate_account_password(raw_password)?;

    tracing::info!("Tentando criar instrutor: {}", username);
    let password_hash = auth_service::hash_password(raw_password).await?;
    let id = Uuid::new_v4().to_string();

    let insert = sqlx::query(
        "INSERT INTO instructors (id, username, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&id)
    .bind(username)
    .bind(&password_hash)
    .bind(name)
    .bind(now)
    .execute(db_pool)
    .await;

    match insert {
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!("Falha ao criar instrutor: username '{}' já existe.", username);
            Err(AppError::Conflict("This username is already taken.".into()))
        }
        Err(e) => Err(e.into()),
        Ok(_) => {
            tracing::info!("✅ Instrutor '{}' criado com sucesso.", username);
            find_instructor_by_id(db_pool, &id)
                .await?
                .ok_or(AppError::InternalServerError)
        }
    }
}

pub async fn authenticate_instructor(
    db_pool: &SqlitePool,
    username: &str,
    password: &str,
) -> AppResult<Instructor> {
    let Some(instructor) = find_instructor_by_username(db_pool, username).await? else {
        tracing::warn!("Instrutor não encontrado: {}", username);
        return Err(AppError::InvalidCredentials);
    };
    if auth_service::verify_password(password, &instructor.password_hash).await? {
        Ok(instructor)
    } else {
        tracing::warn!("Senha incorreta para instrutor: {}", username);
        Err(AppError::InvalidCredentials)
    }
}
