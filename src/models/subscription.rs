// src/models/subscription.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Valor usado nos limites para "sem limite".
pub const UNLIMITED: i64 = -1;

pub const TRIAL_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Trial,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Trial => "trial",
            Plan::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "trial" => Ok(Plan::Trial),
            "premium" => Ok(Plan::Premium),
            other => Err(format!("plano desconhecido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    PremiumTemplates,
    PasswordProtection,
    EmailNotifications,
    VideoUpload,
    CustomThemes,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::PremiumTemplates => "premium_templates",
            Feature::PasswordProtection => "password_protection",
            Feature::EmailNotifications => "email_notifications",
            Feature::VideoUpload => "video_upload",
            Feature::CustomThemes => "custom_themes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Feature::PremiumTemplates => "Premium templates",
            Feature::PasswordProtection => "Password protection",
            Feature::EmailNotifications => "Email notifications",
            Feature::VideoUpload => "Video uploads",
            Feature::CustomThemes => "Custom themes",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium_templates" => Ok(Feature::PremiumTemplates),
            "password_protection" => Ok(Feature::PasswordProtection),
            "email_notifications" => Ok(Feature::EmailNotifications),
            "video_upload" => Ok(Feature::VideoUpload),
            "custom_themes" => Ok(Feature::CustomThemes),
            other => Err(format!("funcionalidade desconhecida: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Document => "document",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "document" => Ok(MediaType::Document),
            other => Err(format!("tipo de media desconhecido: {}", other)),
        }
    }
}

/// Limites estáticos de um plano.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_portfolios: i64,
    pub max_highlights: i64, // por portfolio
    pub allowed_media_types: &'static [MediaType],
    pub features: &'static [Feature],
}

impl PlanLimits {
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn allows_media(&self, media_type: MediaType) -> bool {
        self.allowed_media_types.contains(&media_type)
    }
}

/// Resultado de uma verificação do gate: permitido ou negado com motivo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GateResult {
    pub fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub portfolios: i64,
    pub highlights: i64,
}

/// Resumo da subscrição para a página de conta.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    pub plan: Plan,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub trial_available: bool,
    pub limits: PlanLimits,
    pub usage: Usage,
}
