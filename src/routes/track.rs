use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::intent::{score, IntentScore, ScoringConfig, SessionSignals};
use crate::models::visitor::{
    DbVisitorSession, PageViewRequest, SessionStartRequest, VisitorEventRequest, VisitorSession,
};
use crate::utils::utc_now;

/// Paths that flip conversion-signal milestones when viewed.
fn milestone_column(path: &str) -> Option<&'static str> {
    let path = path.to_lowercase();
    if path.contains("pricing") {
        Some("visited_pricing")
    } else if path.contains("services") {
        Some("visited_services")
    } else if path.contains("portfolio") {
        Some("visited_portfolio")
    } else if path.contains("contact") {
        Some("visited_contact")
    } else {
        None
    }
}

/// Event types that flip milestone flags.
fn event_column(event_type: &str) -> Option<&'static str> {
    match event_type {
        "form_start" => Some("started_form"),
        "form_submit" => Some("completed_form"),
        "cta_click" => Some("clicked_cta"),
        "video_play" | "video_complete" => Some("watched_video"),
        _ => None,
    }
}

async fn fetch_session(state: &AppState, id: Uuid) -> AppResult<VisitorSession> {
    sqlx::query_as::<_, DbVisitorSession>(
        "SELECT id, visitor_id, source_site, status, is_returning, visited_pricing, visited_services, \
                visited_portfolio, visited_contact, started_form, completed_form, clicked_cta, \
                watched_video, intent_score, intent_level, started_at, last_activity_at \
         FROM visitor_sessions WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Session not found"))?
    .try_into()
}

/// Rebuild the full signal set for a session and refresh the cached score
/// columns. Eager and synchronous: runs on every page-view/event append.
pub async fn recompute_intent(state: &AppState, session_id: Uuid) -> AppResult<IntentScore> {
    let config = ScoringConfig::load(&state.pool).await?;

    let session_row = sqlx::query(
        "SELECT is_returning, visited_pricing, visited_services, visited_portfolio, visited_contact, \
                started_form, completed_form, clicked_cta, watched_video \
         FROM visitor_sessions WHERE id = ?",
    )
    .bind(session_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Session not found"))?;

    let view_row = sqlx::query(
        "SELECT COUNT(*) AS views, COALESCE(SUM(dwell_seconds), 0) AS total_seconds, \
                CAST(COALESCE(AVG(scroll_depth), 0) AS REAL) AS avg_scroll \
         FROM page_views WHERE session_id = ?",
    )
    .bind(session_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    let event_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM visitor_events WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_one(&state.pool)
            .await?;

    let signals = SessionSignals {
        page_views: view_row.get::<i64, _>("views").max(0) as u32,
        total_seconds: view_row.get::<i64, _>("total_seconds").max(0) as u32,
        avg_scroll_depth: view_row.get::<f64, _>("avg_scroll").max(0.0) as u32,
        interaction_events: event_count.max(0) as u32,
        started_form: session_row.get("started_form"),
        completed_form: session_row.get("completed_form"),
        visited_pricing: session_row.get("visited_pricing"),
        visited_services: session_row.get("visited_services"),
        visited_portfolio: session_row.get("visited_portfolio"),
        visited_contact: session_row.get("visited_contact"),
        clicked_cta: session_row.get("clicked_cta"),
        watched_video: session_row.get("watched_video"),
        is_returning: session_row.get("is_returning"),
    };

    let result = score(&signals, &config);

    sqlx::query("UPDATE visitor_sessions SET intent_score = ?, intent_level = ? WHERE id = ?")
        .bind(result.total as i64)
        .bind(result.level.as_str())
        .bind(session_id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(result)
}

#[utoipa::path(
    post,
    path = "/api/track/sessions",
    tag = "Tracking",
    request_body = SessionStartRequest,
    responses((status = 201, description = "Session started", body = VisitorSession))
)]
pub async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionStartRequest>,
) -> AppResult<(StatusCode, Json<VisitorSession>)> {
    if payload.visitor_id.trim().is_empty() || payload.source_site.trim().is_empty() {
        return Err(AppError::bad_request("visitor_id and source_site are required"));
    }

    // A visitor with any prior session is returning regardless of what the
    // client claims.
    let prior: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visitor_sessions WHERE visitor_id = ?")
        .bind(&payload.visitor_id)
        .fetch_one(&state.pool)
        .await?;
    let is_returning = payload.is_returning || prior > 0;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO visitor_sessions (id, visitor_id, source_site, status, is_returning, started_at, last_activity_at) \
         VALUES (?, ?, ?, 'active', ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(payload.visitor_id.trim())
    .bind(payload.source_site.trim())
    .bind(is_returning)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    if is_returning {
        recompute_intent(&state, id).await?;
    }

    Ok((StatusCode::CREATED, Json(fetch_session(&state, id).await?)))
}

#[utoipa::path(
    post,
    path = "/api/track/sessions/{id}/pageviews",
    tag = "Tracking",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = PageViewRequest,
    responses(
        (status = 201, description = "Page view recorded", body = VisitorSession),
        (status = 404, description = "Session not found"),
    )
)]
pub async fn record_page_view(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<PageViewRequest>,
) -> AppResult<(StatusCode, Json<VisitorSession>)> {
    fetch_session(&state, session_id).await?;

    if !(0..=100).contains(&payload.scroll_depth) {
        return Err(AppError::bad_request("scroll_depth must be between 0 and 100"));
    }

    // A lone page view is the session's bounce candidate. The flag clears
    // as soon as a second view (or any interaction event) lands.
    let prior_views: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM page_views WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_one(&state.pool)
            .await?;
    if prior_views > 0 {
        sqlx::query("UPDATE page_views SET is_bounce = 0 WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&state.pool)
            .await?;
    }

    let now = utc_now();
    sqlx::query(
        "INSERT INTO page_views (id, session_id, path, dwell_seconds, scroll_depth, is_bounce, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(&payload.path)
    .bind(payload.dwell_seconds.max(0))
    .bind(payload.scroll_depth)
    .bind(prior_views == 0)
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    if let Some(column) = milestone_column(&payload.path) {
        // Column names come from a fixed internal table, never user input.
        let sql = format!("UPDATE visitor_sessions SET {column} = 1 WHERE id = ?");
        sqlx::query(&sql)
            .bind(session_id.to_string())
            .execute(&state.pool)
            .await?;
    }

    sqlx::query("UPDATE visitor_sessions SET status = 'active', last_activity_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(session_id.to_string())
        .execute(&state.pool)
        .await?;

    recompute_intent(&state, session_id).await?;

    Ok((StatusCode::CREATED, Json(fetch_session(&state, session_id).await?)))
}

#[utoipa::path(
    post,
    path = "/api/track/sessions/{id}/events",
    tag = "Tracking",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = VisitorEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = VisitorSession),
        (status = 404, description = "Session not found"),
    )
)]
pub async fn record_event(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<VisitorEventRequest>,
) -> AppResult<(StatusCode, Json<VisitorSession>)> {
    fetch_session(&state, session_id).await?;

    if payload.event_type.trim().is_empty() {
        return Err(AppError::bad_request("event_type is required"));
    }

    let now = utc_now();
    sqlx::query(
        "INSERT INTO visitor_events (id, session_id, event_type, intent_points, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(payload.event_type.trim())
    .bind(payload.intent_points.max(0))
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    if let Some(column) = event_column(payload.event_type.trim()) {
        let sql = format!("UPDATE visitor_sessions SET {column} = 1 WHERE id = ?");
        sqlx::query(&sql)
            .bind(session_id.to_string())
            .execute(&state.pool)
            .await?;
    }

    // An interaction disqualifies the session as a bounce.
    sqlx::query("UPDATE page_views SET is_bounce = 0 WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&state.pool)
        .await?;

    sqlx::query("UPDATE visitor_sessions SET status = 'active', last_activity_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(session_id.to_string())
        .execute(&state.pool)
        .await?;

    recompute_intent(&state, session_id).await?;

    Ok((StatusCode::CREATED, Json(fetch_session(&state, session_id).await?)))
}
