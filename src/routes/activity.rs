use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::{permissions as perm, Access};
use crate::errors::AppResult;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Max rows, newest first. Defaults to 50, capped at 500.
    pub limit: Option<i64>,
    /// Filter by severity: critical, important or noise.
    pub severity: Option<String>,
}

#[derive(Debug, FromRow)]
struct DbActivityEntry {
    id: String,
    event_name: String,
    description: String,
    actor_id: Option<String>,
    subject_id: Option<String>,
    occurred_at: DateTime<Utc>,
    properties: Option<String>,
    severity: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: String,
    pub event_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    pub severity: String,
}

impl From<DbActivityEntry> for ActivityEntry {
    fn from(db: DbActivityEntry) -> Self {
        ActivityEntry {
            id: db.id,
            event_name: db.event_name,
            description: db.description,
            actor_id: db.actor_id,
            subject_id: db.subject_id,
            occurred_at: db.occurred_at,
            properties: db.properties.and_then(|raw| serde_json::from_str(&raw).ok()),
            severity: db.severity,
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/activity",
    tag = "Activity",
    params(ActivityQuery),
    responses((status = 200, description = "Recent activity, newest first", body = [ActivityEntry])),
    security(("bearerAuth" = []))
)]
pub async fn recent_activity(
    State(state): State<AppState>,
    access: Access,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    access.require(perm::VIEW_ACTIVITY)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let mut sql = String::from(
        "SELECT id, event_name, description, actor_id, subject_id, occurred_at, properties, severity \
         FROM activity_log",
    );
    if query.severity.is_some() {
        sql.push_str(" WHERE severity = ?");
    }
    sql.push_str(" ORDER BY occurred_at DESC LIMIT ?");

    let mut rows = sqlx::query_as::<_, DbActivityEntry>(&sql);
    if let Some(severity) = &query.severity {
        rows = rows.bind(severity);
    }

    let entries = rows
        .bind(limit)
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(ActivityEntry::from)
        .collect();

    Ok(Json(entries))
}
