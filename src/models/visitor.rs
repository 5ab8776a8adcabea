use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::intent::IntentLevel;

/// Inactivity thresholds for the active -> idle -> ended lifecycle.
/// Evaluated on read; there is no background sweeper.
pub const IDLE_AFTER_MINUTES: i64 = 30;
pub const ENDED_AFTER_MINUTES: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Idle => "idle",
            SessionStatus::Ended => "ended",
        }
    }

    /// Effective status given the last activity timestamp.
    pub fn effective(last_activity_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let idle_minutes = (now - last_activity_at).num_minutes();
        if idle_minutes >= ENDED_AFTER_MINUTES {
            SessionStatus::Ended
        } else if idle_minutes >= IDLE_AFTER_MINUTES {
            SessionStatus::Idle
        } else {
            SessionStatus::Active
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VisitorSession {
    pub id: Uuid,
    pub visitor_id: String,
    pub source_site: String,
    pub status: SessionStatus,
    pub is_returning: bool,
    pub visited_pricing: bool,
    pub visited_services: bool,
    pub visited_portfolio: bool,
    pub visited_contact: bool,
    pub started_form: bool,
    pub completed_form: bool,
    pub clicked_cta: bool,
    pub watched_video: bool,
    pub intent_score: i64,
    pub intent_level: IntentLevel,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbVisitorSession {
    pub id: String,
    pub visitor_id: String,
    pub source_site: String,
    pub status: String,
    pub is_returning: bool,
    pub visited_pricing: bool,
    pub visited_services: bool,
    pub visited_portfolio: bool,
    pub visited_contact: bool,
    pub started_form: bool,
    pub completed_form: bool,
    pub clicked_cta: bool,
    pub watched_video: bool,
    pub intent_score: i64,
    pub intent_level: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl TryFrom<DbVisitorSession> for VisitorSession {
    type Error = AppError;

    fn try_from(db: DbVisitorSession) -> Result<Self, Self::Error> {
        // Lifecycle status is derived from inactivity at read time; the
        // stored column only matters as a historical record for ended rows.
        let status = SessionStatus::effective(db.last_activity_at, Utc::now());

        Ok(VisitorSession {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid session id: {err}")))?,
            visitor_id: db.visitor_id,
            source_site: db.source_site,
            status,
            is_returning: db.is_returning,
            visited_pricing: db.visited_pricing,
            visited_services: db.visited_services,
            visited_portfolio: db.visited_portfolio,
            visited_contact: db.visited_contact,
            started_form: db.started_form,
            completed_form: db.completed_form,
            clicked_cta: db.clicked_cta,
            watched_video: db.watched_video,
            intent_score: db.intent_score,
            intent_level: IntentLevel::from_str(&db.intent_level),
            started_at: db.started_at,
            last_activity_at: db.last_activity_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PageView {
    pub id: String,
    pub session_id: String,
    pub path: String,
    pub dwell_seconds: i64,
    pub scroll_depth: i64,
    pub is_bounce: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct VisitorEvent {
    pub id: String,
    pub session_id: String,
    pub event_type: String,
    pub intent_points: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// TRACKING INGEST REQUESTS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionStartRequest {
    #[schema(example = "vis_8f2c1b")]
    pub visitor_id: String,
    #[schema(example = "siteA")]
    pub source_site: String,
    #[serde(default)]
    pub is_returning: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PageViewRequest {
    #[schema(example = "/pricing")]
    pub path: String,
    #[serde(default)]
    pub dwell_seconds: i64,
    /// 0..=100
    #[serde(default)]
    pub scroll_depth: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VisitorEventRequest {
    /// click, scroll, video, form_start, form_submit, cta_click, ...
    #[schema(example = "cta_click")]
    pub event_type: String,
    #[serde(default)]
    pub intent_points: i64,
}

/// Session detail for the admin analytics view.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: VisitorSession,
    pub page_views: Vec<PageView>,
    pub events: Vec<VisitorEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lifecycle_thresholds() {
        let now = Utc::now();
        assert_eq!(
            SessionStatus::effective(now - Duration::minutes(5), now),
            SessionStatus::Active
        );
        assert_eq!(
            SessionStatus::effective(now - Duration::minutes(45), now),
            SessionStatus::Idle
        );
        assert_eq!(
            SessionStatus::effective(now - Duration::minutes(180), now),
            SessionStatus::Ended
        );
    }
}
