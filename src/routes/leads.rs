use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{permissions, Access};
use crate::errors::{AppError, AppResult, ValidationErrors};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::lead::{DbLead, Lead, LeadCaptureRequest, LeadStatus, LeadUpdateRequest};
use crate::routes::track::recompute_intent;
use crate::utils::{is_valid_email, utc_now};

const SPAM_THRESHOLD: i64 = 50;
const SPAM_KEYWORDS: &[&str] = &["seo ranking", "backlink", "casino", "crypto airdrop", "viagra"];

/// Naive additive spam score: link density, keyword hits, honeypot.
fn spam_score(message: &str, honeypot_filled: bool) -> i64 {
    let mut score = 0i64;

    let lower = message.to_lowercase();
    score += (lower.matches("http://").count() + lower.matches("https://").count()) as i64 * 15;
    score += SPAM_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count() as i64 * 20;

    if honeypot_filled {
        score += 100;
    }

    score.min(100)
}

fn validate_capture(payload: &LeadCaptureRequest) -> AppResult<()> {
    let mut errors = ValidationErrors::new();

    if payload.name.trim().is_empty() {
        errors.add("name", "name is required");
    }
    if payload.email.trim().is_empty() {
        errors.add("email", "email is required");
    } else if !is_valid_email(&payload.email) {
        errors.add("email", "email must be a valid address");
    }
    if payload.message.trim().is_empty() {
        errors.add("message", "message is required");
    }
    if payload.source_site.trim().is_empty() {
        errors.add("source_site", "source_site is required");
    }
    if let Some(locale) = &payload.locale {
        if locale != "en" && locale != "es" {
            errors.add("locale", "locale must be one of: en, es");
        }
    }

    errors.into_result()
}

/// Public contact-form endpoint. Spam still gets stored (flagged) so staff
/// can audit false positives; only clean leads trigger the ops email.
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = LeadCaptureRequest,
    responses(
        (status = 201, description = "Lead captured", body = Lead),
        (status = 422, description = "Validation failed"),
    )
)]
pub async fn capture_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LeadCaptureRequest>,
) -> AppResult<(StatusCode, Json<Lead>)> {
    validate_capture(&payload)?;

    let honeypot_filled = payload
        .website
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    let score = spam_score(&payload.message, honeypot_filled);
    let is_spam = score >= SPAM_THRESHOLD;

    // Optional linkage back to the originating visitor session.
    let session_id = match payload.session_id {
        Some(id) => {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM visitor_sessions WHERE id = ?",
            )
            .bind(id.to_string())
            .fetch_one(&state.pool)
            .await?;
            (exists > 0).then_some(id)
        }
        None => None,
    };

    let id = Uuid::new_v4();
    let now = utc_now();
    let locale = payload.locale.unwrap_or_else(|| "en".to_string());

    sqlx::query(
        "INSERT INTO leads (id, name, email, phone, message, source_site, locale, status, spam_score, is_spam, session_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'new', ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(&payload.phone)
    .bind(&payload.message)
    .bind(&payload.source_site)
    .bind(&locale)
    .bind(score)
    .bind(is_spam)
    .bind(session_id.map(|s| s.to_string()))
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    // A submitted contact form is the completed_form milestone.
    if let Some(session_id) = session_id {
        sqlx::query(
            "UPDATE visitor_sessions SET completed_form = 1, visited_contact = 1 WHERE id = ?",
        )
        .bind(session_id.to_string())
        .execute(&state.pool)
        .await?;
        recompute_intent(&state, session_id).await?;
    }

    let lead = fetch_lead(&state, id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        None,
        &lead,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    if !lead.is_spam {
        state.mailer.notify_new_lead(&lead);
    }

    Ok((StatusCode::CREATED, Json(lead)))
}

async fn fetch_lead(state: &AppState, id: Uuid) -> AppResult<Lead> {
    sqlx::query_as::<_, DbLead>(
        "SELECT id, name, email, phone, message, source_site, locale, status, spam_score, is_spam, session_id, created_at, updated_at \
         FROM leads WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Lead not found"))?
    .try_into()
}

#[derive(Debug, Deserialize)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub source_site: Option<String>,
    /// Spam rows are hidden unless explicitly requested.
    #[serde(default)]
    pub include_spam: bool,
}

#[utoipa::path(
    get,
    path = "/admin/leads",
    tag = "Leads",
    responses((status = 200, description = "List leads", body = [Lead])),
    security(("bearerAuth" = []))
)]
pub async fn list_leads(
    State(state): State<AppState>,
    access: Access,
    Query(filter): Query<LeadFilter>,
) -> AppResult<Json<Vec<Lead>>> {
    access.require(permissions::VIEW_LEADS)?;

    if let Some(status) = &filter.status {
        LeadStatus::parse(status)?;
    }

    let mut sql = String::from(
        "SELECT id, name, email, phone, message, source_site, locale, status, spam_score, is_spam, session_id, created_at, updated_at \
         FROM leads WHERE 1 = 1",
    );
    if !filter.include_spam {
        sql.push_str(" AND is_spam = 0");
    }
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.source_site.is_some() {
        sql.push_str(" AND source_site = ?");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query_as::<_, DbLead>(&sql);
    if let Some(status) = &filter.status {
        query = query.bind(status);
    }
    if let Some(site) = &filter.source_site {
        query = query.bind(site);
    }

    let rows = query.fetch_all(&state.pool).await?;
    let leads = rows.into_iter().map(Lead::try_from).collect::<Result<_, _>>()?;
    Ok(Json(leads))
}

#[utoipa::path(
    get,
    path = "/admin/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    responses(
        (status = 200, description = "Lead details", body = Lead),
        (status = 404, description = "Lead not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_lead(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lead>> {
    access.require(permissions::VIEW_LEADS)?;
    Ok(Json(fetch_lead(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    request_body = LeadUpdateRequest,
    responses(
        (status = 200, description = "Lead updated", body = Lead),
        (status = 404, description = "Lead not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_lead(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadUpdateRequest>,
) -> AppResult<Json<Lead>> {
    access.require(permissions::EDIT_LEADS)?;

    let before = fetch_lead(&state, id).await?;

    if let Some(email) = &payload.email {
        if !is_valid_email(email) {
            let mut errors = ValidationErrors::new();
            errors.add("email", "email must be a valid address");
            errors.into_result()?;
        }
    }

    let status = payload.status.unwrap_or(before.status);
    let name = payload.name.unwrap_or_else(|| before.name.clone());
    let email = payload.email.unwrap_or_else(|| before.email.clone());
    let phone = payload.phone.or_else(|| before.phone.clone());
    let is_spam = payload.is_spam.unwrap_or(before.is_spam);

    sqlx::query(
        "UPDATE leads SET name = ?, email = ?, phone = ?, status = ?, is_spam = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&email)
    .bind(&phone)
    .bind(status.as_str())
    .bind(is_spam)
    .bind(utc_now().to_rfc3339())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    let after = fetch_lead(&state, id).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(access.user_id),
        &after,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(after))
}

#[utoipa::path(
    delete,
    path = "/admin/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead id")),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 404, description = "Lead not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_lead(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(permissions::DELETE_LEADS)?;

    let lead = fetch_lead(&state, id).await?;

    sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(access.user_id),
        &lead,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honeypot_forces_spam() {
        assert!(spam_score("hello there", true) >= SPAM_THRESHOLD);
        assert!(spam_score("hello there", false) < SPAM_THRESHOLD);
    }

    #[test]
    fn link_density_raises_score() {
        let spammy = "buy now https://a.example https://b.example https://c.example https://d.example";
        assert!(spam_score(spammy, false) >= SPAM_THRESHOLD);
    }

    #[test]
    fn keyword_hits_accumulate() {
        let score = spam_score("great backlink deals and casino traffic", false);
        assert_eq!(score, 40);
    }
}
