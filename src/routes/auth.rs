use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::AppendHeaders;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::csrf::{issue_token, CSRF_COOKIE};
use crate::auth::SESSION_COOKIE;
use crate::authz::Access;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, MeResponse, User};
use crate::utils::verify_password;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn session_cookie(token: &str, max_age_hours: i64) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age_hours * 3600
    )
}

/// Readable by the SPA so it can echo the value in the CSRF header.
fn csrf_cookie(token: &str, max_age_hours: i64) -> String {
    format!(
        "{CSRF_COOKIE}={token}; Path=/; SameSite=Lax; Max-Age={}",
        max_age_hours * 3600
    )
}

pub async fn fetch_user_by_id(pool: &sqlx::SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, is_admin, created_at, updated_at, deleted_at \
         FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(AppendHeaders<[(axum::http::HeaderName, String); 2]>, Json<AuthResponse>)> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, is_admin, created_at, updated_at, deleted_at \
         FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id)?;
    let csrf_token = issue_token();

    log_activity(&state.event_bus, "login", Some(user.id), &user);

    let headers = AppendHeaders([
        (SET_COOKIE, session_cookie(&token, state.jwt.exp_hours)),
        (SET_COOKIE, csrf_cookie(&csrf_token, state.jwt.exp_hours)),
    ]);

    Ok((headers, Json(AuthResponse { token, csrf_token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout() -> (AppendHeaders<[(axum::http::HeaderName, String); 2]>, Json<MessageResponse>) {
    // Stateless tokens: logout just clears the browser cookies.
    let headers = AppendHeaders([
        (SET_COOKIE, format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0")),
        (SET_COOKIE, format!("{CSRF_COOKIE}=; Path=/; Max-Age=0")),
    ]);

    (
        headers,
        Json(MessageResponse {
            message: "logged out".to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user with effective permissions", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, access: Access) -> AppResult<Json<MeResponse>> {
    let db_user = fetch_user_by_id(&state.pool, access.user_id).await?;
    let user: User = db_user.try_into()?;

    Ok(Json(MeResponse {
        user,
        roles: access.profile.role_slug_list(),
        permissions: access.profile.permission_slugs(),
        is_super_admin: access.profile.is_super_admin,
    }))
}
