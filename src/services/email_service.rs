// src/services/email_service.rs
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    templates::{EventFollowupEmail, InvitationEmail, TrialReminderEmail},
};
use askama::Template;
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::time::Duration;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Atraso fixo antes da única nova tentativa.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    TrialReminder,
    EventFollowup,
    Invitation,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::TrialReminder => "trial_reminder",
            EmailKind::EventFollowup => "event_followup",
            EmailKind::Invitation => "invitation",
        }
    }
}

/// Envia emails pela API HTTP da Resend.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }

    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
                "text": message.text,
            }))
            .send()
            .await
            .map_err(|e| AppError::Email(format!("pedido à Resend falhou: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::Email(format!("Resend respondeu {}: {}", status, body)))
        }
    }
}

/// Caixa de correio de teste: guarda as mensagens e pode falhar as N primeiras.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Arc<tokio::sync::Mutex<Vec<EmailMessage>>>,
    pub failures_left: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn failing(times: usize) -> Self {
        let mailer = Self::default();
        mailer
            .failures_left
            .store(times, std::sync::atomic::Ordering::SeqCst);
        mailer
    }

    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        use std::sync::atomic::Ordering;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Email("falha simulada".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Mailer {
    Resend(ResendMailer),
    /// Sem API key: só escreve no log.
    Log,
    #[cfg(test)]
    Recording(RecordingMailer),
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.resend_api_key {
            Some(key) => {
                tracing::info!("📧 Emails enviados via Resend.");
                Mailer::Resend(ResendMailer::new(key.clone(), config.email_from.clone()))
            }
            None => {
                tracing::warn!("⚠️ RESEND_API_KEY não definida: emails só vão para o log.");
                Mailer::Log
            }
        }
    }

    pub async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        match self {
            Mailer::Resend(mailer) => mailer.send(message).await,
            Mailer::Log => {
                tracing::info!("📧 [log] Para: {} | Assunto: {}\n{}", message.to, message.subject, message.text);
                Ok(())
            }
            #[cfg(test)]
            Mailer::Recording(mailer) => mailer.send(message).await,
        }
    }
}

async fn log_attempt(
    db_pool: &SqlitePool,
    message: &EmailMessage,
    kind: EmailKind,
    result: &AppResult<()>,
) {
    let (status, error) = match result {
        Ok(()) => ("sent", None),
        Err(e) => ("failed", Some(e.to_string())),
    };
    // Falhar o registo não deve falhar o envio
    if let Err(e) = sqlx::query(
        "INSERT INTO email_log (recipient, subject, kind, status, error, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&message.to)
    .bind(&message.subject)
    .bind(kind.as_str())
    .bind(status)
    .bind(error)
    .bind(Utc::now())
    .execute(db_pool)
    .await
    {
        tracing::error!("Erro ao registar envio de email: {:?}", e);
    }
}

/// Envia com uma única nova tentativa após `retry_delay`.
pub async fn send_with_retry(
    db_pool: &SqlitePool,
    mailer: &Mailer,
    message: &EmailMessage,
    kind: EmailKind,
    retry_delay: Duration,
) -> AppResult<()> {
    let first = mailer.send(message).await;
    log_attempt(db_pool, message, kind, &first).await;
    let Err(first_err) = first else {
        return Ok(());
    };

    tracing::warn!(
        "Envio de '{}' para {} falhou ({}); nova tentativa em {:?}.",
        kind.as_str(),
        message.to,
        first_err,
        retry_delay
    );
    tokio::time::sleep(retry_delay).await;

    let second = mailer.send(message).await;
    log_attempt(db_pool, message, kind, &second).await;
    if let Err(e) = &second {
        tracing::error!("❌ Envio de '{}' para {} falhou de novo: {}", kind.as_str(), message.to, e);
    }
    second
}

// --- Mensagens ---

fn render_html<T: Template>(template: &T) -> AppResult<String> {
    template.render().map_err(|e| {
        tracing::error!("Falha ao renderizar email: {}", e);
        AppError::InternalServerError
    })
}

pub fn trial_reminder_email(to: &str, name: &str, days_left: i64, app_url: &str) -> AppResult<EmailMessage> {
    let when = match days_left {
        d if d <= 0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d => format!("in {} days", d),
    };
    let upgrade_url = format!("{}/account/subscription", app_url);
    let html = render_html(&TrialReminderEmail {
        name,
        when: &when,
        upgrade_url: &upgrade_url,
    })?;
    Ok(EmailMessage {
        to: to.to_string(),
        subject: format!("Your Kifolio trial ends {}", when),
        html,
        text: format!(
            "Hi {},\n\nYour Kifolio Premium trial ends {}. Upgrade to Premium to keep every feature: {}\n",
            name, when, upgrade_url
        ),
    })
}

pub fn event_followup_email(
    to: &str,
    name: &str,
    child_name: &str,
    title: &str,
    portfolio_url: &str,
) -> AppResult<EmailMessage> {
    let html = render_html(&EventFollowupEmail {
        name,
        child_name,
        title,
        portfolio_url,
    })?;
    Ok(EmailMessage {
        to: to.to_string(),
        subject: format!("How did \"{}\" go?", title),
        html,
        text: format!(
            "Hi {},\n\nYesterday was \"{}\" for {}. Add photos or notes while the memory is fresh: {}\n",
            name, title, child_name, portfolio_url
        ),
    })
}

pub fn invitation_email(
    to: &str,
    inviter: &str,
    child_name: &str,
    portfolio_url: &str,
    token: &str,
) -> AppResult<EmailMessage> {
    let link = format!("{}?invite={}", portfolio_url, token);
    let html = render_html(&InvitationEmail {
        inviter,
        child_name,
        link: &link,
    })?;
    Ok(EmailMessage {
        to: to.to_string(),
        subject: format!("{} shared {}'s portfolio with you", inviter, child_name),
        html,
        text: format!(
            "{} invited you to follow {}'s Kifolio portfolio: {}\n",
            inviter, child_name, link
        ),
    })
}
