// src/services/webhook_service.rs
//! Webhook da Stripe: verificação da assinatura e encaminhamento por tipo
//! de evento. Cada handler copia meia dúzia de campos do objeto do evento
//! para a linha do utilizador.

use crate::{
    error::{AppError, AppResult},
    models::webhook::{StripeEvent, StripeEventKind, WebhookOutcome},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use sqlx::SqlitePool;

type HmacSha256 = Hmac<Sha256>;

/// Tolerância (segundos) entre o timestamp assinado e o relógio local.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verifica o header `Stripe-Signature` (`t=<unix>,v1=<hex>[,v1=...]`).
pub fn verify_signature(payload: &str, header: &str, secret: &str, now: DateTime<Utc>) -> AppResult<()> {
    if secret.is_empty() {
        tracing::error!("Webhook recebido mas STRIPE_WEBHOOK_SECRET não está configurada.");
        return Err(AppError::InvalidSignature);
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::warn!("Webhook: timestamp em falta no header de assinatura.");
        AppError::InvalidSignature
    })?;
    if signatures.is_empty() {
        tracing::warn!("Webhook: assinatura v1 em falta.");
        return Err(AppError::InvalidSignature);
    }

    let age = (now.timestamp() - timestamp).abs();
    if age > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!("Webhook: timestamp fora da tolerância ({}s).", age);
        return Err(AppError::InvalidSignature);
    }

    let signed_payload = format!("{}.{}", timestamp, payload);
    let valid = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(signed_payload.as_bytes());
        // Comparação em tempo constante
        mac.verify_slice(&expected).is_ok()
    });

    if valid {
        Ok(())
    } else {
        tracing::warn!("Webhook: assinatura não corresponde.");
        Err(AppError::InvalidSignature)
    }
}

/// Verifica e faz o parse do evento.
pub fn construct_event(payload: &str, header: &str, secret: &str, now: DateTime<Utc>) -> AppResult<StripeEvent> {
    verify_signature(payload, header, secret, now)?;
    serde_json::from_str::<StripeEvent>(payload).map_err(|e| {
        tracing::warn!("Webhook: JSON do evento inválido: {}", e);
        AppError::Validation("Malformed event payload.".into())
    })
}

fn str_field<'a>(object: &'a Value, field: &str) -> AppResult<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation(format!("Campo '{}' em falta no evento.", field)))
}

fn timestamp_field(object: &Value, field: &str) -> Option<DateTime<Utc>> {
    object
        .get(field)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Fim do período atual; em versões novas da API está nos items.
fn current_period_end(subscription: &Value) -> Option<DateTime<Utc>> {
    timestamp_field(subscription, "current_period_end").or_else(|| {
        subscription
            .pointer("/items/data/0/current_period_end")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    })
}

fn plan_for_status(status: &str) -> &'static str {
    match status {
        "active" | "trialing" | "past_due" => "premium",
        _ => "free",
    }
}

/// Encaminha o evento para o handler do seu tipo.
pub async fn handle_event(db_pool: &SqlitePool, event: &StripeEvent, now: DateTime<Utc>) -> AppResult<WebhookOutcome> {
    let Some(kind) = StripeEventKind::parse(&event.event_type) else {
        tracing::info!("Webhook: evento '{}' ({}) ignorado.", event.event_type, event.id);
        return Ok(WebhookOutcome::Ignored);
    };

    tracing::info!("📨 Webhook: a processar '{}' ({}).", event.event_type, event.id);
    let object = &event.data.object;
    let rows_updated = match kind {
        StripeEventKind::CheckoutSessionCompleted => checkout_completed(db_pool, object, now).await?,
        StripeEventKind::SubscriptionCreated | StripeEventKind::SubscriptionUpdated => {
            subscription_changed(db_pool, object, now).await?
        }
        StripeEventKind::SubscriptionDeleted => subscription_deleted(db_pool, object, now).await?,
        StripeEventKind::InvoicePaymentSucceeded => payment_succeeded(db_pool, object, now).await?,
        StripeEventKind::InvoicePaymentFailed => payment_failed(db_pool, object, now).await?,
    };

    if rows_updated == 0 {
        tracing::warn!("Webhook: '{}' ({}) não corresponde a nenhum utilizador.", event.event_type, event.id);
    }
    Ok(WebhookOutcome::Processed { rows_updated })
}

async fn checkout_completed(db_pool: &SqlitePool, session: &Value, now: DateTime<Utc>) -> AppResult<u64> {
    let user_id = session
        .pointer("/metadata/userId")
        .and_then(Value::as_str)
        .or_else(|| session.get("client_reference_id").and_then(Value::as_str))
        .ok_or_else(|| AppError::Validation("Checkout sem metadata.userId.".into()))?;
    let customer_id = str_field(session, "customer")?;
    let subscription_id = session.get("subscription").and_then(Value::as_str);

    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = 'premium',
            subscription_status = 'active',
            stripe_customer_id = ?1,
            stripe_subscription_id = COALESCE(?2, stripe_subscription_id),
            subscription_ends_at = NULL,
            updated_at = ?3
        WHERE id = ?4
        "#,
    )
    .bind(customer_id)
    .bind(subscription_id)
    .bind(now)
    .bind(user_id)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Checkout concluído para {} (cliente {}).", user_id, customer_id);
    Ok(result.rows_affected())
}

async fn subscription_changed(db_pool: &SqlitePool, subscription: &Value, now: DateTime<Utc>) -> AppResult<u64> {
    let subscription_id = str_field(subscription, "id")?;
    let customer_id = str_field(subscription, "customer")?;
    let status = str_field(subscription, "status")?;
    let cancel_at_period_end = subscription
        .get("cancel_at_period_end")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    // Só há data de fim se a subscrição não for renovar
    let ends_at = if cancel_at_period_end {
        current_period_end(subscription)
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        UPDATE users
        SET stripe_subscription_id = ?1,
            subscription_status = ?2,
            subscription_plan = ?3,
            subscription_ends_at = ?4,
            updated_at = ?5
        WHERE stripe_customer_id = ?6
        "#,
    )
    .bind(subscription_id)
    .bind(status)
    .bind(plan_for_status(status))
    .bind(ends_at)
    .bind(now)
    .bind(customer_id)
    .execute(db_pool)
    .await?;

    tracing::info!("Subscrição {} do cliente {} agora '{}'.", subscription_id, customer_id, status);
    Ok(result.rows_affected())
}

async fn subscription_deleted(db_pool: &SqlitePool, subscription: &Value, now: DateTime<Utc>) -> AppResult<u64> {
    let subscription_id = str_field(subscription, "id")?;

    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = 'free',
            subscription_status = 'canceled',
            subscription_ends_at = NULL,
            updated_at = ?1
        WHERE stripe_subscription_id = ?2
        "#,
    )
    .bind(now)
    .bind(subscription_id)
    .execute(db_pool)
    .await?;

    tracing::info!("Subscrição {} cancelada.", subscription_id);
    Ok(result.rows_affected())
}

async fn payment_succeeded(db_pool: &SqlitePool, invoice: &Value, now: DateTime<Utc>) -> AppResult<u64> {
    let subscription_id = str_field(invoice, "subscription")?;

    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = 'premium', subscription_status = 'active', updated_at = ?1
        WHERE stripe_subscription_id = ?2
        "#,
    )
    .bind(now)
    .bind(subscription_id)
    .execute(db_pool)
    .await?;
    Ok(result.rows_affected())
}

async fn payment_failed(db_pool: &SqlitePool, invoice: &Value, now: DateTime<Utc>) -> AppResult<u64> {
    let subscription_id = str_field(invoice, "subscription")?;

    let result = sqlx::query(
        "UPDATE users SET subscription_status = 'past_due', updated_at = ?1 WHERE stripe_subscription_id = ?2",
    )
    .bind(now)
    .bind(subscription_id)
    .execute(db_pool)
    .await?;

    tracing::warn!("💳 Pagamento falhou para a subscrição {}.", subscription_id);
    Ok(result.rows_affected())
}

/// Gera um header `Stripe-Signature` válido (para testes).
#[cfg(test)]
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
