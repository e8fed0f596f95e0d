// src/services/subscription_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        subscription::{
            Feature, GateResult, MediaType, Plan, PlanLimits, SubscriptionSummary, Usage, TRIAL_DAYS,
            UNLIMITED,
        },
        user::User,
    },
    services::account_service,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

const UPGRADE_CTA: &str = "Upgrade to Premium";

const FREE_LIMITS: PlanLimits = PlanLimits {
    max_portfolios: 1,
    max_highlights: 10,
    allowed_media_types: &[MediaType::Image],
    features: &[],
};

// Trial e premium partilham o mesmo conjunto de limites
const PREMIUM_LIMITS: PlanLimits = PlanLimits {
    max_portfolios: UNLIMITED,
    max_highlights: UNLIMITED,
    allowed_media_types: &[MediaType::Image, MediaType::Video, MediaType::Document],
    features: &[
        Feature::PremiumTemplates,
        Feature::PasswordProtection,
        Feature::EmailNotifications,
        Feature::VideoUpload,
        Feature::CustomThemes,
    ],
};

pub fn get_plan_limits(plan: Plan) -> PlanLimits {
    match plan {
        Plan::Free => FREE_LIMITS,
        Plan::Trial | Plan::Premium => PREMIUM_LIMITS,
    }
}

/// Um período pago ou de trial que já terminou faz o plano voltar a free.
fn has_lapsed(plan: Plan, user: &User, now: DateTime<Utc>) -> bool {
    let ends_at = match plan {
        Plan::Free => return false,
        Plan::Trial => user.trial_ends_at,
        Plan::Premium => user.subscription_ends_at,
    };
    ends_at.is_some_and(|ends_at| ends_at <= now)
}

async fn downgrade_to_free(db_pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = 'free', subscription_status = 'expired', updated_at = ?1
        WHERE id = ?2
        "#,
    )
    .bind(now)
    .bind(user_id)
    .execute(db_pool)
    .await?;
    Ok(())
}

/// Plano efetivo de um utilizador já carregado; grava o downgrade se expirou.
pub async fn effective_plan(db_pool: &SqlitePool, user: &User, now: DateTime<Utc>) -> AppResult<Plan> {
    let plan = user.subscription_plan.parse::<Plan>().unwrap_or_else(|e| {
        tracing::warn!("Utilizador {} com {}; a tratar como free.", user.id, e);
        Plan::Free
    });

    if has_lapsed(plan, user, now) {
        tracing::info!("Plano '{}' do utilizador {} expirou; a voltar para free.", plan, user.id);
        downgrade_to_free(db_pool, &user.id, now).await?;
        return Ok(Plan::Free);
    }
    Ok(plan)
}

pub async fn get_user_plan(db_pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> AppResult<Plan> {
    let user = account_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    effective_plan(db_pool, &user, now).await
}

async fn count_portfolios(db_pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM portfolios WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

async fn count_highlights(db_pool: &SqlitePool, portfolio_id: &str) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM highlights WHERE portfolio_id = ?1")
        .bind(portfolio_id)
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

fn within_limit(limit: i64, current: i64) -> bool {
    limit == UNLIMITED || current < limit
}

fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

pub async fn can_create_portfolio(
    db_pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<GateResult> {
    let plan = get_user_plan(db_pool, user_id, now).await?;
    let limits = get_plan_limits(plan);
    if limits.max_portfolios == UNLIMITED {
        return Ok(GateResult::allow());
    }

    let current = count_portfolios(db_pool, user_id).await?;
    tracing::debug!("Gate portfolios: user {} tem {}/{}", user_id, current, limits.max_portfolios);
    if within_limit(limits.max_portfolios, current) {
        Ok(GateResult::allow())
    } else {
        Ok(GateResult::deny(format!(
            "The {} plan allows {}. {} for unlimited portfolios.",
            plan,
            plural(limits.max_portfolios, "portfolio"),
            UPGRADE_CTA
        )))
    }
}

pub async fn can_add_highlight(
    db_pool: &SqlitePool,
    user_id: &str,
    portfolio_id: &str,
    now: DateTime<Utc>,
) -> AppResult<GateResult> {
    let plan = get_user_plan(db_pool, user_id, now).await?;
    let limits = get_plan_limits(plan);
    if limits.max_highlights == UNLIMITED {
        return Ok(GateResult::allow());
    }

    let current = count_highlights(db_pool, portfolio_id).await?;
    tracing::debug!("Gate highlights: portfolio {} tem {}/{}", portfolio_id, current, limits.max_highlights);
    if within_limit(limits.max_highlights, current) {
        Ok(GateResult::allow())
    } else {
        Ok(GateResult::deny(format!(
            "The {} plan allows {} per portfolio. {} for unlimited highlights.",
            plan,
            plural(limits.max_highlights, "highlight"),
            UPGRADE_CTA
        )))
    }
}

pub async fn can_upload_media(
    db_pool: &SqlitePool,
    user_id: &str,
    media_type: &str,
    now: DateTime<Utc>,
) -> AppResult<GateResult> {
    let Ok(media_type) = media_type.parse::<MediaType>() else {
        return Ok(GateResult::deny(format!("Unsupported media type '{}'.", media_type)));
    };

    let plan = get_user_plan(db_pool, user_id, now).await?;
    if get_plan_limits(plan).allows_media(media_type) {
        Ok(GateResult::allow())
    } else {
        Ok(GateResult::deny(format!(
            "{} uploads are not included in the {} plan. {} to upload them.",
            media_type.as_str(),
            plan,
            UPGRADE_CTA
        )))
    }
}

pub async fn can_use_feature(
    db_pool: &SqlitePool,
    user_id: &str,
    feature: Feature,
    now: DateTime<Utc>,
) -> AppResult<GateResult> {
    let plan = get_user_plan(db_pool, user_id, now).await?;
    if get_plan_limits(plan).has_feature(feature) {
        Ok(GateResult::allow())
    } else {
        Ok(GateResult::deny(format!(
            "{} is a Premium feature. {} to use it.",
            feature.label(),
            UPGRADE_CTA
        )))
    }
}

/// Converte uma negação do gate em erro 403 com o motivo.
pub fn require(gate: GateResult) -> AppResult<()> {
    if gate.allowed {
        Ok(())
    } else {
        Err(AppError::LimitReached(
            gate.reason.unwrap_or_else(|| format!("{}.", UPGRADE_CTA)),
        ))
    }
}

/// Inicia o trial de 14 dias. Só uma vez por conta, e só a partir de free.
pub async fn start_trial(db_pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> AppResult<User> {
    let user = account_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let plan = effective_plan(db_pool, &user, now).await?;
    if plan != Plan::Free {
        return Err(AppError::Validation(format!("You are already on the {} plan.", plan)));
    }
    if user.trial_started_at.is_some() {
        return Err(AppError::Validation("Your free trial has already been used.".into()));
    }

    let trial_ends_at = now + Duration::days(TRIAL_DAYS);
    sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = 'trial',
            subscription_status = 'trialing',
            trial_started_at = ?1,
            trial_ends_at = ?2,
            updated_at = ?1
        WHERE id = ?3
        "#,
    )
    .bind(now)
    .bind(trial_ends_at)
    .bind(user_id)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Trial iniciado para {} (termina em {}).", user_id, trial_ends_at);
    account_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn subscription_summary(
    db_pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<SubscriptionSummary> {
    let user = account_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let plan = effective_plan(db_pool, &user, now).await?;
    // Relê para apanhar um eventual downgrade
    let user = account_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let highlights = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM highlights h JOIN portfolios p ON p.id = h.portfolio_id WHERE p.user_id = ?1",
    )
    .bind(user_id)
    .fetch_one(db_pool)
    .await?;

    Ok(SubscriptionSummary {
        plan,
        status: user.subscription_status,
        trial_ends_at: user.trial_ends_at,
        subscription_ends_at: user.subscription_ends_at,
        trial_available: plan == Plan::Free && user.trial_started_at.is_none(),
        limits: get_plan_limits(plan),
        usage: Usage {
            portfolios: count_portfolios(db_pool, user_id).await?,
            highlights,
        },
    })
}
