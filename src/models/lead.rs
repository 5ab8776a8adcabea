use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "qualified" => Ok(LeadStatus::Qualified),
            "converted" => Ok(LeadStatus::Converted),
            "lost" => Ok(LeadStatus::Lost),
            other => Err(AppError::bad_request(format!("unknown lead status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub message: String,
    pub source_site: String,
    pub locale: String,
    pub status: LeadStatus,
    pub spam_score: i64,
    pub is_spam: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Lead {
    fn entity_type() -> &'static str {
        "lead"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Important
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbLead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub source_site: String,
    pub locale: String,
    pub status: String,
    pub spam_score: i64,
    pub is_spam: bool,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbLead> for Lead {
    type Error = AppError;

    fn try_from(db: DbLead) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid lead id: {err}")))?,
            name: db.name,
            email: db.email,
            phone: db.phone,
            message: db.message,
            source_site: db.source_site,
            locale: db.locale,
            status: LeadStatus::parse(&db.status)?,
            spam_score: db.spam_score,
            is_spam: db.is_spam,
            session_id: db.session_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Public contact-form payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LeadCaptureRequest {
    #[schema(example = "María García")]
    pub name: String,
    #[schema(example = "maria@example.com")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "I'd like a quote for a new site.")]
    pub message: String,
    #[schema(example = "siteA")]
    pub source_site: String,
    /// "en" or "es"; drives the notification template.
    #[serde(default)]
    pub locale: Option<String>,
    /// Originating visitor session, when the tracking script is present.
    pub session_id: Option<Uuid>,
    /// Honeypot field; humans leave it empty.
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeadUpdateRequest {
    pub status: Option<LeadStatus>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_spam: Option<bool>,
}
