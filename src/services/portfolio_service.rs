// src/services/portfolio_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        portfolio::{
            find_template, CreatePortfolioPayload, EmailPreferences, EmailPreferencesPayload, Highlight,
            HighlightPayload, Invitation, Portfolio, PublicPortfolio, UpdatePortfolioPayload,
            DEFAULT_TEMPLATE,
        },
        subscription::Feature,
    },
    services::{auth_service, subscription_service},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const PORTFOLIO_COLUMNS: &str =
    "id, user_id, child_name, bio, template, is_private, password_hash, created_at, updated_at";

const HIGHLIGHT_COLUMNS: &str =
    "id, portfolio_id, title, description, highlight_date, media_url, media_type, followup_sent_at, created_at";

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::Validation(format!("{} is required.", field)))
    } else {
        Ok(value.to_string())
    }
}

/// Valida o template e aplica o gate de templates premium.
async fn check_template(
    db_pool: &SqlitePool,
    user_id: &str,
    template: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let info = find_template(template)
        .ok_or_else(|| AppError::Validation(format!("Unknown template '{}'.", template)))?;
    if info.premium {
        subscription_service::require(
            subscription_service::can_use_feature(db_pool, user_id, Feature::PremiumTemplates, now).await?,
        )?;
    }
    Ok(())
}

async fn hash_portfolio_password(
    db_pool: &SqlitePool,
    user_id: &str,
    password: &str,
    now: DateTime<Utc>,
) -> AppResult<String> {
    subscription_service::require(
        subscription_service::can_use_feature(db_pool, user_id, Feature::PasswordProtection, now).await?,
    )?;
    auth_service::validate_password_length(password)?;
    auth_service::hash_password(password).await
}

// --- Portfolios ---

pub async fn find_portfolio(db_pool: &SqlitePool, portfolio_id: &str) -> AppResult<Option<Portfolio>> {
    let portfolio = sqlx::query_as::<_, Portfolio>(&format!(
        "SELECT {} FROM portfolios WHERE id = ?1",
        PORTFOLIO_COLUMNS
    ))
    .bind(portfolio_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(portfolio)
}

/// Portfolio do utilizador; 404 se não existir ou pertencer a outra pessoa.
pub async fn get_owned_portfolio(
    db_pool: &SqlitePool,
    user_id: &str,
    portfolio_id: &str,
) -> AppResult<Portfolio> {
    match find_portfolio(db_pool, portfolio_id).await? {
        Some(p) if p.user_id == user_id => Ok(p),
        Some(_) => {
            tracing::warn!("Utilizador {} tentou aceder ao portfolio {} de outra pessoa.", user_id, portfolio_id);
            Err(AppError::NotFound)
        }
        None => Err(AppError::NotFound),
    }
}

pub async fn list_portfolios(db_pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Portfolio>> {
    let portfolios = sqlx::query_as::<_, Portfolio>(&format!(
        "SELECT {} FROM portfolios WHERE user_id = ?1 ORDER BY created_at ASC",
        PORTFOLIO_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(portfolios)
}

pub async fn create_portfolio(
    db_pool: &SqlitePool,
    user_id: &str,
    payload: CreatePortfolioPayload,
    now: DateTime<Utc>,
) -> AppResult<Portfolio> {
    let child_name = required_text(&payload.child_name, "Child name")?;

    // Sem trava entre a contagem e o INSERT: dois pedidos simultâneos
    // podem ambos passar o limite.
    subscription_service::require(subscription_service::can_create_portfolio(db_pool, user_id, now).await?)?;

    let template = payload.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    check_template(db_pool, user_id, template, now).await?;

    let password_hash = match payload.password.as_deref().filter(|pw| !pw.is_empty()) {
        Some(pw) => Some(hash_portfolio_password(db_pool, user_id, pw, now).await?),
        None => None,
    };
    // Uma password só faz sentido num portfolio privado
    let is_private = payload.is_private || password_hash.is_some();

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO portfolios (id, user_id, child_name, bio, template, is_private, password_hash, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(&child_name)
    .bind(payload.bio.as_deref())
    .bind(template)
    .bind(is_private)
    .bind(password_hash)
    .bind(now)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Portfolio '{}' criado para {} ({}).", id, user_id, child_name);
    find_portfolio(db_pool, &id).await?.ok_or(AppError::InternalServerError)
}

pub async fn update_portfolio(
    db_pool: &SqlitePool,
    user_id: &str,
    portfolio_id: &str,
    payload: UpdatePortfolioPayload,
    now: DateTime<Utc>,
) -> AppResult<Portfolio> {
    let mut portfolio = get_owned_portfolio(db_pool, user_id, portfolio_id).await?;

    if let Some(child_name) = payload.child_name.as_deref() {
        portfolio.child_name = required_text(child_name, "Child name")?;
    }
    if let Some(bio) = payload.bio {
        portfolio.bio = Some(bio).filter(|b| !b.trim().is_empty());
    }
    if let Some(template) = payload.template {
        if template != portfolio.template {
            check_template(db_pool, user_id, &template, now).await?;
            portfolio.template = template;
        }
    }
    if let Some(is_private) = payload.is_private {
        portfolio.is_private = is_private;
    }
    match payload.password.as_deref() {
        Some("") => portfolio.password_hash = None,
        Some(pw) => {
            portfolio.password_hash = Some(hash_portfolio_password(db_pool, user_id, pw, now).await?);
            portfolio.is_private = true;
        }
        None => {}
    }

    sqlx::query(
        r#"
        UPDATE portfolios
        SET child_name = ?1, bio = ?2, template = ?3, is_private = ?4, password_hash = ?5, updated_at = ?6
        WHERE id = ?7
        "#,
    )
    .bind(&portfolio.child_name)
    .bind(portfolio.bio.as_deref())
    .bind(&portfolio.template)
    .bind(portfolio.is_private)
    .bind(portfolio.password_hash.as_deref())
    .bind(now)
    .bind(portfolio_id)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Portfolio '{}' atualizado.", portfolio_id);
    find_portfolio(db_pool, portfolio_id).await?.ok_or(AppError::NotFound)
}

pub async fn delete_portfolio(db_pool: &SqlitePool, user_id: &str, portfolio_id: &str) -> AppResult<()> {
    let rows_affected = sqlx::query("DELETE FROM portfolios WHERE id = ?1 AND user_id = ?2")
        .bind(portfolio_id)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("🗑️ Portfolio '{}' apagado.", portfolio_id);
    Ok(())
}

/// Portfolio + highlights para a página pública. O acesso é decidido antes.
pub async fn load_public_portfolio(
    db_pool: &SqlitePool,
    portfolio_id: &str,
) -> AppResult<Option<PublicPortfolio>> {
    let Some(portfolio) = find_portfolio(db_pool, portfolio_id).await? else {
        return Ok(None);
    };
    let highlights = list_highlights(db_pool, portfolio_id).await?;
    Ok(Some(PublicPortfolio {
        portfolio: portfolio.into(),
        highlights,
    }))
}

// --- Highlights ---

pub async fn list_highlights(db_pool: &SqlitePool, portfolio_id: &str) -> AppResult<Vec<Highlight>> {
    let highlights = sqlx::query_as::<_, Highlight>(&format!(
        "SELECT {} FROM highlights WHERE portfolio_id = ?1 ORDER BY highlight_date DESC, created_at DESC",
        HIGHLIGHT_COLUMNS
    ))
    .bind(portfolio_id)
    .fetch_all(db_pool)
    .await?;
    Ok(highlights)
}

async fn find_owned_highlight(
    db_pool: &SqlitePool,
    user_id: &str,
    highlight_id: &str,
) -> AppResult<Highlight> {
    sqlx::query_as::<_, Highlight>(
        r#"
        SELECT h.id, h.portfolio_id, h.title, h.description, h.highlight_date,
               h.media_url, h.media_type, h.followup_sent_at, h.created_at
        FROM highlights h
        JOIN portfolios p ON p.id = h.portfolio_id
        WHERE h.id = ?1 AND p.user_id = ?2
        "#,
    )
    .bind(highlight_id)
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound)
}

/// O URL acaba num `href`/`src` da página pública: só http(s).
fn validate_media_url(url: &str) -> AppResult<()> {
    match reqwest::Url::parse(url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::Validation("media_url must be an http or https URL.".into())),
    }
}

async fn check_media(
    db_pool: &SqlitePool,
    user_id: &str,
    payload: &HighlightPayload,
    now: DateTime<Utc>,
) -> AppResult<()> {
    match (payload.media_url.as_deref(), payload.media_type.as_deref()) {
        (Some(url), Some(media_type)) => {
            validate_media_url(url)?;
            subscription_service::require(
                subscription_service::can_upload_media(db_pool, user_id, media_type, now).await?,
            )
        }
        (None, None) => Ok(()),
        _ => Err(AppError::Validation(
            "media_url and media_type must be given together.".into(),
        )),
    }
}

pub async fn create_highlight(
    db_pool: &SqlitePool,
    user_id: &str,
    portfolio_id: &str,
    payload: HighlightPayload,
    now: DateTime<Utc>,
) -> AppResult<Highlight> {
    get_owned_portfolio(db_pool, user_id, portfolio_id).await?;
    let title = required_text(&payload.title, "Title")?;

    subscription_service::require(
        subscription_service::can_add_highlight(db_pool, user_id, portfolio_id, now).await?,
    )?;
    check_media(db_pool, user_id, &payload, now).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO highlights (id, portfolio_id, title, description, highlight_date, media_url, media_type, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(portfolio_id)
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.highlight_date)
    .bind(payload.media_url.as_deref())
    .bind(payload.media_type.as_deref())
    .bind(now)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Highlight '{}' adicionado ao portfolio {}.", id, portfolio_id);
    find_owned_highlight(db_pool, user_id, &id).await
}

pub async fn update_highlight(
    db_pool: &SqlitePool,
    user_id: &str,
    highlight_id: &str,
    payload: HighlightPayload,
    now: DateTime<Utc>,
) -> AppResult<Highlight> {
    let existing = find_owned_highlight(db_pool, user_id, highlight_id).await?;
    let title = required_text(&payload.title, "Title")?;

    // Só volta a passar pelo gate se o media mudou
    if payload.media_type != existing.media_type || payload.media_url != existing.media_url {
        check_media(db_pool, user_id, &payload, now).await?;
    }

    sqlx::query(
        r#"
        UPDATE highlights
        SET title = ?1, description = ?2, highlight_date = ?3, media_url = ?4, media_type = ?5
        WHERE id = ?6
        "#,
    )
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.highlight_date)
    .bind(payload.media_url.as_deref())
    .bind(payload.media_type.as_deref())
    .bind(highlight_id)
    .execute(db_pool)
    .await?;

    find_owned_highlight(db_pool, user_id, highlight_id).await
}

pub async fn delete_highlight(db_pool: &SqlitePool, user_id: &str, highlight_id: &str) -> AppResult<()> {
    let highlight = find_owned_highlight(db_pool, user_id, highlight_id).await?;
    sqlx::query("DELETE FROM highlights WHERE id = ?1")
        .bind(&highlight.id)
        .execute(db_pool)
        .await?;
    tracing::info!("🗑️ Highlight '{}' apagado.", highlight_id);
    Ok(())
}

// --- Preferências de email ---

pub async fn get_email_preferences(
    db_pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<EmailPreferences> {
    // Contas antigas podem não ter linha; cria com os valores por omissão
    sqlx::query(
        "INSERT OR IGNORE INTO email_preferences (user_id, trial_reminders, event_followups, marketing, updated_at) VALUES (?1, 1, 1, 0, ?2)",
    )
    .bind(user_id)
    .bind(now)
    .execute(db_pool)
    .await?;

    let prefs = sqlx::query_as::<_, EmailPreferences>(
        "SELECT user_id, trial_reminders, event_followups, marketing, updated_at FROM email_preferences WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_one(db_pool)
    .await?;
    Ok(prefs)
}

pub async fn update_email_preferences(
    db_pool: &SqlitePool,
    user_id: &str,
    payload: EmailPreferencesPayload,
    now: DateTime<Utc>,
) -> AppResult<EmailPreferences> {
    let current = get_email_preferences(db_pool, user_id, now).await?;
    sqlx::query(
        r#"
        UPDATE email_preferences
        SET trial_reminders = ?1, event_followups = ?2, marketing = ?3, updated_at = ?4
        WHERE user_id = ?5
        "#,
    )
    .bind(payload.trial_reminders.unwrap_or(current.trial_reminders))
    .bind(payload.event_followups.unwrap_or(current.event_followups))
    .bind(payload.marketing.unwrap_or(current.marketing))
    .bind(now)
    .bind(user_id)
    .execute(db_pool)
    .await?;

    get_email_preferences(db_pool, user_id, now).await
}

// --- Convites ---

pub async fn create_invitation(
    db_pool: &SqlitePool,
    user_id: &str,
    portfolio_id: &str,
    email: &str,
    now: DateTime<Utc>,
) -> AppResult<Invitation> {
    get_owned_portfolio(db_pool, user_id, portfolio_id).await?;
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email address is required.".into()));
    }

    let invitation = Invitation {
        id: Uuid::new_v4().to_string(),
        portfolio_id: portfolio_id.to_string(),
        email,
        token: Uuid::new_v4().simple().to_string(),
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO invitations (id, portfolio_id, email, token, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&invitation.id)
    .bind(&invitation.portfolio_id)
    .bind(&invitation.email)
    .bind(&invitation.token)
    .bind(invitation.created_at)
    .execute(db_pool)
    .await?;

    tracing::info!("✉️ Convite criado para {} (portfolio {}).", invitation.email, portfolio_id);
    Ok(invitation)
}
