// src/models/portfolio.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub child_name: String,
    pub bio: Option<String>,
    pub template: String,
    pub is_private: bool,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Portfolio tal como é devolvido pela API (sem o hash da password).
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub id: String,
    pub user_id: String,
    pub child_name: String,
    pub bio: Option<String>,
    pub template: String,
    pub is_private: bool,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Portfolio> for PortfolioView {
    fn from(p: Portfolio) -> Self {
        Self {
            has_password: p.password_hash.is_some(),
            id: p.id,
            user_id: p.user_id,
            child_name: p.child_name,
            bio: p.bio,
            template: p.template,
            is_private: p.is_private,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Highlight {
    pub id: String,
    pub portfolio_id: String,
    pub title: String,
    pub description: Option<String>,
    pub highlight_date: NaiveDate,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    #[serde(skip_serializing)]
    pub followup_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Usados pelo template da página pública
impl Highlight {
    pub fn is_image(&self) -> bool {
        self.media_type.as_deref() == Some("image")
    }

    pub fn is_video(&self) -> bool {
        self.media_type.as_deref() == Some("video")
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmailPreferences {
    pub user_id: String,
    pub trial_reminders: bool,
    pub event_followups: bool,
    pub marketing: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invitation {
    pub id: String,
    pub portfolio_id: String,
    pub email: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Portfolio + highlights, para a página pública.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPortfolio {
    pub portfolio: PortfolioView,
    pub highlights: Vec<Highlight>,
}

// --- Catálogo de templates ---

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub premium: bool,
}

pub const DEFAULT_TEMPLATE: &str = "classic";

pub const TEMPLATES: &[TemplateInfo] = &[
    TemplateInfo { id: "classic", name: "Classic", premium: false },
    TemplateInfo { id: "simple", name: "Simple", premium: false },
    TemplateInfo { id: "modern", name: "Modern", premium: true },
    TemplateInfo { id: "playful", name: "Playful", premium: true },
    TemplateInfo { id: "elegant", name: "Elegant", premium: true },
];

pub fn find_template(id: &str) -> Option<&'static TemplateInfo> {
    TEMPLATES.iter().find(|t| t.id == id)
}

// --- Payloads JSON recebidos pela API ---

#[derive(Debug, Deserialize)]
pub struct CreatePortfolioPayload {
    pub child_name: String,
    pub bio: Option<String>,
    pub template: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub password: Option<String>,
}

/// Campos ausentes ficam como estão. `password: ""` remove a password.
#[derive(Debug, Deserialize)]
pub struct UpdatePortfolioPayload {
    pub child_name: Option<String>,
    pub bio: Option<String>,
    pub template: Option<String>,
    pub is_private: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HighlightPayload {
    pub title: String,
    pub description: Option<String>,
    pub highlight_date: NaiveDate,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailPreferencesPayload {
    pub trial_reminders: Option<bool>,
    pub event_followups: Option<bool>,
    pub marketing: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationPayload {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordPayload {
    pub password: String,
}
