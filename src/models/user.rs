// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Representa um pai/mãe lido da tabela 'users' (produto Kifolio)
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub subscription_plan: String, // "free", "trial" ou "premium"
    pub subscription_status: String,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub trial_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Representa um instrutor lido da tabela 'instructors' (produto Tracker)
#[derive(Debug, Clone, FromRow)]
pub struct Instructor {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Vista pública de um utilizador (nunca inclui o hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            subscription_plan: user.subscription_plan,
            subscription_status: user.subscription_status,
            trial_ends_at: user.trial_ends_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorProfile {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl From<Instructor> for InstructorProfile {
    fn from(instructor: Instructor) -> Self {
        Self {
            id: instructor.id,
            username: instructor.username,
            name: instructor.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserPayload {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInstructorPayload {
    pub username: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct InstructorLoginPayload {
    pub username: String,
    pub password: String,
}
