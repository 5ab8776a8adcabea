use std::collections::HashMap;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::AppError;

use super::resolver::{AccessProfile, AccessSnapshot, RoleGrant};

/// Client IP as reported by the reverse proxy. First hop of
/// `x-forwarded-for`, falling back to `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(String::from)
        })
}

/// Blocklist pre-check. Runs before authentication is even evaluated and
/// rejects with a terse fixed body so blocked clients learn nothing about
/// the routes behind it.
pub async fn ip_blocklist(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(ip) = client_ip(req.headers()) {
        if state.config.blocked_ips.contains(&ip) {
            tracing::warn!(ip = %ip, "blocked ip rejected");
            let body = serde_json::json!({"success": false, "message": "Access denied"});
            return (StatusCode::FORBIDDEN, Json(body)).into_response();
        }
    }

    next.run(req).await
}

/// Authenticated principal with resolved permissions. Extracting this runs
/// the whole guard chain for a handler: authentication (401 on failure),
/// then a fresh permission snapshot. Handlers call `require*` for the 403
/// stage; those methods are the only boolean-to-status translation point.
#[derive(Debug, Clone)]
pub struct Access {
    pub user_id: Uuid,
    pub profile: AccessProfile,
}

impl Access {
    pub fn require(&self, slug: &str) -> Result<(), AppError> {
        if self.profile.has_permission(slug) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, permission = %slug, "permission denied");
            Err(AppError::forbidden(format!("missing permission: {slug}")))
        }
    }

    pub fn require_any(&self, slugs: &[&str]) -> Result<(), AppError> {
        if self.profile.has_any_permission(slugs) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "missing all of: {}",
                slugs.join(", ")
            )))
        }
    }

}

/// Load the authorization snapshot for a user. Reads the registry fresh on
/// every request so super-admins see permissions created after their roles
/// were assigned.
pub async fn load_snapshot(pool: &SqlitePool, user_id: Uuid) -> Result<Option<AccessSnapshot>, AppError> {
    let user_row = sqlx::query("SELECT id, is_admin FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some(user_row) = user_row else {
        return Ok(None);
    };

    let is_admin_flag: bool = user_row.get("is_admin");

    let grant_rows = sqlx::query(
        "SELECT r.slug AS role_slug, p.slug AS permission_slug \
         FROM user_roles ur \
         JOIN roles r ON r.id = ur.role_id \
         LEFT JOIN role_permissions rp ON rp.role_id = r.id \
         LEFT JOIN permissions p ON p.id = rp.permission_id \
         WHERE ur.user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut grants: HashMap<String, Vec<String>> = HashMap::new();
    for row in &grant_rows {
        let role_slug: String = row.get("role_slug");
        let entry = grants.entry(role_slug).or_default();
        if let Some(permission) = row.get::<Option<String>, _>("permission_slug") {
            entry.push(permission);
        }
    }

    let roles = grants
        .into_iter()
        .map(|(slug, permissions)| RoleGrant { slug, permissions })
        .collect();

    let registry = sqlx::query_scalar::<_, String>("SELECT slug FROM permissions")
        .fetch_all(pool)
        .await?;

    Ok(Some(AccessSnapshot {
        user_id,
        is_admin_flag,
        roles,
        registry,
    }))
}

#[async_trait]
impl axum::extract::FromRequestParts<AppState> for Access {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let snapshot = load_snapshot(&state.pool, auth.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("unknown user"))?;

        Ok(Access {
            user_id: auth.user_id,
            profile: AccessProfile::resolve(Some(&snapshot)),
        })
    }
}
