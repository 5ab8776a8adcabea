use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::analytics::{aggregate, DashboardStats, PageViewFacts, SessionFacts};
use crate::app::AppState;
use crate::authz::{permissions as perm, Access};
use crate::errors::{AppError, AppResult};
use crate::intent::IntentLevel;
use crate::models::visitor::{
    DbVisitorSession, PageView, SessionDetails, VisitorEvent, VisitorSession,
};
use crate::utils::utc_now;

const SESSION_COLUMNS: &str = "id, visitor_id, source_site, status, is_returning, \
    visited_pricing, visited_services, visited_portfolio, visited_contact, \
    started_form, completed_form, clicked_cta, watched_video, \
    intent_score, intent_level, started_at, last_activity_at";

#[derive(Debug, Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// Window size in days, counted back from now. Defaults to 30.
    pub days: Option<i64>,
    /// Restrict to one source site.
    pub source_site: Option<String>,
}

impl PeriodQuery {
    fn since(&self) -> DateTime<Utc> {
        let days = self.days.unwrap_or(30).clamp(1, 365);
        utc_now() - Duration::days(days)
    }
}

#[derive(Debug, FromRow)]
struct SessionFactsRow {
    id: String,
    visitor_id: String,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    intent_level: String,
    interaction_events: i64,
}

impl TryFrom<SessionFactsRow> for SessionFacts {
    type Error = AppError;

    fn try_from(row: SessionFactsRow) -> Result<Self, Self::Error> {
        Ok(SessionFacts {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| AppError::internal(format!("invalid session id: {err}")))?,
            visitor_id: row.visitor_id,
            started_at: row.started_at,
            last_activity_at: row.last_activity_at,
            intent_level: IntentLevel::from_str(&row.intent_level),
            interaction_events: row.interaction_events.max(0) as u32,
        })
    }
}

#[utoipa::path(
    get,
    path = "/admin/analytics/dashboard",
    tag = "Analytics",
    params(PeriodQuery),
    responses((status = 200, description = "Dashboard rollup", body = DashboardStats)),
    security(("bearerAuth" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    access: Access,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<DashboardStats>> {
    access.require(perm::VIEW_ANALYTICS)?;

    let since = query.since().to_rfc3339();
    let site_filter = query.source_site.as_deref();

    let mut session_sql = String::from(
        "SELECT s.id, s.visitor_id, s.started_at, s.last_activity_at, \
                s.intent_level, \
                (SELECT COUNT(*) FROM visitor_events e WHERE e.session_id = s.id) \
                    AS interaction_events \
         FROM visitor_sessions s WHERE s.started_at >= ?",
    );
    if site_filter.is_some() {
        session_sql.push_str(" AND s.source_site = ?");
    }

    let mut session_query = sqlx::query_as::<_, SessionFactsRow>(&session_sql).bind(&since);
    if let Some(site) = site_filter {
        session_query = session_query.bind(site);
    }
    let sessions: Vec<SessionFacts> = session_query
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(SessionFacts::try_from)
        .collect::<Result<_, _>>()?;

    let mut view_sql = String::from(
        "SELECT p.session_id, p.path FROM page_views p \
         JOIN visitor_sessions s ON s.id = p.session_id \
         WHERE s.started_at >= ?",
    );
    if site_filter.is_some() {
        view_sql.push_str(" AND s.source_site = ?");
    }

    let mut view_query = sqlx::query_as::<_, (String, String)>(&view_sql).bind(&since);
    if let Some(site) = site_filter {
        view_query = view_query.bind(site);
    }
    let page_views: Vec<PageViewFacts> = view_query
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .filter_map(|(session_id, path)| {
            Uuid::parse_str(&session_id)
                .ok()
                .map(|session_id| PageViewFacts { session_id, path })
        })
        .collect();

    let mut lead_sql = String::from(
        "SELECT l.session_id, l.created_at FROM leads l \
         JOIN visitor_sessions s ON s.id = l.session_id \
         WHERE l.session_id IS NOT NULL AND l.is_spam = 0 AND s.started_at >= ?",
    );
    if site_filter.is_some() {
        lead_sql.push_str(" AND s.source_site = ?");
    }

    let mut lead_query = sqlx::query_as::<_, (String, DateTime<Utc>)>(&lead_sql).bind(&since);
    if let Some(site) = site_filter {
        lead_query = lead_query.bind(site);
    }
    let lead_sessions: Vec<(Uuid, DateTime<Utc>)> = lead_query
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .filter_map(|(session_id, created_at)| {
            Uuid::parse_str(&session_id).ok().map(|id| (id, created_at))
        })
        .collect();

    Ok(Json(aggregate(&sessions, &page_views, &lead_sessions)))
}

#[utoipa::path(
    get,
    path = "/admin/analytics/sessions",
    tag = "Analytics",
    params(PeriodQuery),
    responses((status = 200, description = "Sessions in the period", body = [VisitorSession])),
    security(("bearerAuth" = []))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    access: Access,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Vec<VisitorSession>>> {
    access.require(perm::VIEW_ANALYTICS)?;

    let since = query.since().to_rfc3339();

    let mut sql = format!(
        "SELECT {SESSION_COLUMNS} FROM visitor_sessions WHERE started_at >= ?"
    );
    if query.source_site.is_some() {
        sql.push_str(" AND source_site = ?");
    }
    sql.push_str(" ORDER BY last_activity_at DESC LIMIT 200");

    let mut rows = sqlx::query_as::<_, DbVisitorSession>(&sql).bind(&since);
    if let Some(site) = &query.source_site {
        rows = rows.bind(site);
    }

    rows.fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(VisitorSession::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

#[utoipa::path(
    get,
    path = "/admin/analytics/sessions/{id}",
    tag = "Analytics",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session with its page views and events", body = SessionDetails),
        (status = 404, description = "Session not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_session(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionDetails>> {
    // Lead detail links here, so lead access is enough to follow the link.
    access.require_any(&[perm::VIEW_ANALYTICS, perm::VIEW_LEADS])?;

    let session: VisitorSession = sqlx::query_as::<_, DbVisitorSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM visitor_sessions WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Session not found"))?
    .try_into()?;

    let page_views = sqlx::query_as::<_, PageView>(
        "SELECT id, session_id, path, dwell_seconds, scroll_depth, is_bounce, created_at \
         FROM page_views WHERE session_id = ? ORDER BY created_at",
    )
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let events = sqlx::query_as::<_, VisitorEvent>(
        "SELECT id, session_id, event_type, intent_points, created_at \
         FROM visitor_events WHERE session_id = ? ORDER BY created_at",
    )
    .bind(id.to_string())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(SessionDetails {
        session,
        page_views,
        events,
    }))
}
