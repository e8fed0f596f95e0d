// src/services/cron_service.rs
use crate::{
    config::AppConfig,
    error::AppResult,
    services::email_service::{self, EmailKind, Mailer},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// Máximo de emails por execução de cada job.
pub const BATCH_LIMIT: i64 = 100;

/// Lembrete enviado quando faltam no máximo estes dias para o fim do trial.
pub const TRIAL_REMINDER_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CronReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, FromRow)]
struct TrialReminderCandidate {
    id: String,
    email: String,
    name: String,
    trial_ends_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FollowupCandidate {
    highlight_id: String,
    title: String,
    portfolio_id: String,
    child_name: String,
    email: String,
    name: String,
}

fn days_left(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    // Arredonda para cima: 30 horas contam como 2 dias
    let hours = (ends_at - now).num_hours().max(0);
    (hours + 23) / 24
}

/// Lembra quem está em trial que o período está a acabar.
pub async fn run_trial_reminders(
    db_pool: &SqlitePool,
    mailer: &Mailer,
    config: &AppConfig,
    now: DateTime<Utc>,
    retry_delay: std::time::Duration,
) -> AppResult<CronReport> {
    let cutoff = now + Duration::days(TRIAL_REMINDER_WINDOW_DAYS);
    let candidates = sqlx::query_as::<_, TrialReminderCandidate>(
        r#"
        SELECT u.id, u.email, u.name, u.trial_ends_at
        FROM users u
        LEFT JOIN email_preferences ep ON ep.user_id = u.id
        WHERE u.subscription_plan = 'trial'
          AND u.trial_reminder_sent_at IS NULL
          AND u.trial_ends_at IS NOT NULL
          AND u.trial_ends_at > ?1
          AND u.trial_ends_at <= ?2
          AND COALESCE(ep.trial_reminders, 1) = 1
        ORDER BY u.trial_ends_at ASC
        LIMIT ?3
        "#,
    )
    .bind(now)
    .bind(cutoff)
    .bind(BATCH_LIMIT)
    .fetch_all(db_pool)
    .await?;

    tracing::info!("⏰ Lembretes de trial: {} candidatos.", candidates.len());
    let mut report = CronReport::default();

    // Sequencial, um de cada vez
    for candidate in candidates {
        report.processed += 1;
        let message = match email_service::trial_reminder_email(
            &candidate.email,
            &candidate.name,
            days_left(candidate.trial_ends_at, now),
            &config.app_url,
        ) {
            Ok(message) => message,
            Err(_) => {
                report.failed += 1;
                continue;
            }
        };

        match email_service::send_with_retry(db_pool, mailer, &message, EmailKind::TrialReminder, retry_delay).await {
            Ok(()) => {
                sqlx::query("UPDATE users SET trial_reminder_sent_at = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(&candidate.id)
                    .execute(db_pool)
                    .await?;
                report.sent += 1;
            }
            Err(_) => report.failed += 1,
        }
    }

    tracing::info!("✅ Lembretes de trial concluídos: {:?}", report);
    Ok(report)
}

/// Pergunta aos pais como correu um evento de ontem (highlight datado de ontem).
/// Só para planos com notificações por email (trial ou premium em vigor); o
/// filtro fica no SQL para que contas free não ocupem o lote.
pub async fn run_event_followups(
    db_pool: &SqlitePool,
    mailer: &Mailer,
    config: &AppConfig,
    now: DateTime<Utc>,
    retry_delay: std::time::Duration,
) -> AppResult<CronReport> {
    let today: NaiveDate = now.date_naive();
    let yesterday = today - Duration::days(1);

    let candidates = sqlx::query_as::<_, FollowupCandidate>(
        r#"
        SELECT h.id AS highlight_id, h.title, p.id AS portfolio_id, p.child_name,
               u.email, u.name
        FROM highlights h
        JOIN portfolios p ON p.id = h.portfolio_id
        JOIN users u ON u.id = p.user_id
        LEFT JOIN email_preferences ep ON ep.user_id = u.id
        WHERE h.highlight_date = ?1
          AND h.followup_sent_at IS NULL
          AND COALESCE(ep.event_followups, 1) = 1
          AND (
            (u.subscription_plan = 'premium'
              AND (u.subscription_ends_at IS NULL OR u.subscription_ends_at > ?2))
            OR (u.subscription_plan = 'trial' AND u.trial_ends_at > ?2)
          )
        ORDER BY h.created_at ASC
        LIMIT ?3
        "#,
    )
    .bind(yesterday)
    .bind(now)
    .bind(BATCH_LIMIT)
    .fetch_all(db_pool)
    .await?;

    tracing::info!("⏰ Follow-ups de eventos ({}): {} candidatos.", yesterday, candidates.len());
    let mut report = CronReport::default();

    for candidate in candidates {
        report.processed += 1;
        let message = match email_service::event_followup_email(
            &candidate.email,
            &candidate.name,
            &candidate.child_name,
            &candidate.title,
            &config.portfolio_url(&candidate.portfolio_id),
        ) {
            Ok(message) => message,
            Err(_) => {
                report.failed += 1;
                continue;
            }
        };

        match email_service::send_with_retry(db_pool, mailer, &message, EmailKind::EventFollowup, retry_delay).await {
            Ok(()) => {
                sqlx::query("UPDATE highlights SET followup_sent_at = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(&candidate.highlight_id)
                    .execute(db_pool)
                    .await?;
                report.sent += 1;
            }
            Err(_) => report.failed += 1,
        }
    }

    tracing::info!("✅ Follow-ups de eventos concluídos: {:?}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        services::{account_service, email_service::RecordingMailer},
    };

    async fn trial_user(pool: &SqlitePool, email: &str, ends_at: DateTime<Utc>) -> String {
        let user = account_service::create_user(pool, email, "password123", "Parent", Utc::now())
            .await
            .unwrap();
        sqlx::query("UPDATE users SET subscription_plan = 'trial', trial_ends_at = ?1 WHERE id = ?2")
            .bind(ends_at)
            .bind(&user.id)
            .execute(pool)
            .await
            .unwrap();
        user.id
    }

    async fn highlight_on(pool: &SqlitePool, user_id: &str, date: NaiveDate) {
        let portfolio_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO portfolios (id, user_id, child_name, created_at, updated_at) VALUES (?1, ?2, 'Mia', ?3, ?3)",
        )
        .bind(&portfolio_id)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO highlights (id, portfolio_id, title, highlight_date, created_at) VALUES (?1, ?2, 'Recital', ?3, ?4)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&portfolio_id)
        .bind(date)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn days_left_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_left(now + Duration::hours(30), now), 2);
        assert_eq!(days_left(now + Duration::hours(24), now), 1);
        assert_eq!(days_left(now - Duration::hours(1), now), 0);
    }

    #[tokio::test]
    async fn reminds_trials_ending_soon_exactly_once() {
        let pool = test_pool().await;
        let config = AppConfig::for_tests();
        let now = Utc::now();
        trial_user(&pool, "soon@example.com", now + Duration::days(2)).await;
        trial_user(&pool, "later@example.com", now + Duration::days(10)).await;
        let opted_out = trial_user(&pool, "quiet@example.com", now + Duration::days(1)).await;
        sqlx::query("UPDATE email_preferences SET trial_reminders = 0 WHERE user_id = ?1")
            .bind(&opted_out)
            .execute(&pool)
            .await
            .unwrap();

        let recording = RecordingMailer::default();
        let mailer = Mailer::Recording(recording.clone());

        let report = run_trial_reminders(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report, CronReport { processed: 1, sent: 1, failed: 0 });
        assert_eq!(recording.sent.lock().await[0].to, "soon@example.com");

        let again = run_trial_reminders(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn failed_reminder_is_retried_next_run() {
        let pool = test_pool().await;
        let config = AppConfig::for_tests();
        let now = Utc::now();
        trial_user(&pool, "soon@example.com", now + Duration::days(2)).await;

        let mailer = Mailer::Recording(RecordingMailer::failing(2));
        let report = run_trial_reminders(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        let report = run_trial_reminders(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn followups_only_for_yesterday_and_premium_features() {
        let pool = test_pool().await;
        let config = AppConfig::for_tests();
        let now = Utc::now();
        let yesterday = now.date_naive() - Duration::days(1);

        let trial = trial_user(&pool, "trial@example.com", now + Duration::days(7)).await;
        highlight_on(&pool, &trial, yesterday).await;
        highlight_on(&pool, &trial, now.date_naive()).await;

        let free = account_service::create_user(&pool, "free@example.com", "password123", "Free", now)
            .await
            .unwrap();
        highlight_on(&pool, &free.id, yesterday).await;

        let recording = RecordingMailer::default();
        let mailer = Mailer::Recording(recording.clone());
        let report = run_event_followups(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report, CronReport { processed: 1, sent: 1, failed: 0 });
        let sent = recording.sent.lock().await;
        assert_eq!(sent[0].to, "trial@example.com");
        assert!(sent[0].text.contains("http://localhost:3000/p/"));
    }

    #[tokio::test]
    async fn free_plan_backlog_does_not_starve_premium_followups() {
        let pool = test_pool().await;
        let config = AppConfig::for_tests();
        let now = Utc::now();
        let yesterday = now.date_naive() - Duration::days(1);

        let free = account_service::create_user(&pool, "free@example.com", "password123", "Free", now)
            .await
            .unwrap();
        for _ in 0..BATCH_LIMIT {
            highlight_on(&pool, &free.id, yesterday).await;
        }

        let premium = account_service::create_user(&pool, "paid@example.com", "password123", "Paid", now)
            .await
            .unwrap();
        sqlx::query("UPDATE users SET subscription_plan = 'premium', subscription_status = 'active' WHERE id = ?1")
            .bind(&premium.id)
            .execute(&pool)
            .await
            .unwrap();
        highlight_on(&pool, &premium.id, yesterday).await;

        // Trial expirado não conta como plano com notificações
        let lapsed = trial_user(&pool, "lapsed@example.com", now - Duration::days(1)).await;
        highlight_on(&pool, &lapsed, yesterday).await;

        let recording = RecordingMailer::default();
        let mailer = Mailer::Recording(recording.clone());
        let report = run_event_followups(&pool, &mailer, &config, now, std::time::Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report, CronReport { processed: 1, sent: 1, failed: 0 });
        assert_eq!(recording.sent.lock().await[0].to, "paid@example.com");
    }
}
