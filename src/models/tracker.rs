// src/models/tracker.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

// --- Estruturas que espelham as Tabelas da DB ---

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Program {
    pub id: String,
    pub instructor_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Sessão (aula) de um programa. A tabela chama-se `program_sessions`
/// porque `tower_sessions` guarda as sessões HTTP.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProgramSession {
    pub id: String,
    pub program_id: String,
    pub name: String,
    pub session_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub slug: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PortfolioEntry {
    pub id: String,
    pub student_id: String,
    pub title: String,
    pub description: Option<String>,
    pub entry_date: NaiveDate,
    pub entry_type: String,
    pub media_urls: Json<Vec<String>>, // Guardado como texto JSON
    pub created_at: DateTime<Utc>,
}

// --- Payloads JSON recebidos pela API ---

#[derive(Debug, Deserialize)]
pub struct ProgramPayload {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramSessionPayload {
    pub name: String,
    pub session_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct StudentPayload {
    pub name: String,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioEntryPayload {
    pub title: String,
    pub description: Option<String>,
    pub entry_date: NaiveDate,
    #[serde(default = "default_entry_type")]
    pub entry_type: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

fn default_entry_type() -> String {
    "achievement".to_string()
}
