use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_snapshot, permissions as perm, Access, AccessProfile};
use crate::errors::{AppError, AppResult, ValidationErrors};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::user::{DbUser, User, UserCreateRequest, UserUpdateRequest, UserWithRoles};
use crate::routes::auth::fetch_user_by_id;
use crate::utils::{hash_password, is_valid_email, utc_now};

async fn roles_for_user(state: &AppState, user_id: Uuid) -> AppResult<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT r.slug FROM roles r JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = ? ORDER BY r.slug",
    )
    .bind(user_id.to_string())
    .fetch_all(&state.pool)
    .await?)
}

/// Replace the user's role assignment with the given slugs. Unknown slugs
/// reject the whole request.
async fn replace_roles(state: &AppState, user_id: Uuid, slugs: &[String]) -> AppResult<()> {
    let mut role_ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM roles WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;
        match id {
            Some(id) => role_ids.push(id),
            None => return Err(AppError::not_found(format!("unknown role: {slug}"))),
        }
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;
    for role_id in &role_ids {
        sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id.to_string())
            .bind(role_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Users",
    responses((status = 200, description = "List users with their roles", body = [UserWithRoles])),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, access: Access) -> AppResult<Json<Vec<UserWithRoles>>> {
    access.require(perm::VIEW_USERS)?;

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, is_admin, created_at, updated_at, deleted_at \
         FROM users WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        let user: User = row.try_into()?;
        let roles = roles_for_user(&state, user.id).await?;
        users.push(UserWithRoles { user, roles });
    }
    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserWithRoles),
        (status = 409, description = "Email already in use"),
        (status = 422, description = "Validation failed"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Json(req): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<UserWithRoles>)> {
    access.require(perm::MANAGE_USERS)?;

    let mut errors = ValidationErrors::new();
    if req.name.trim().is_empty() {
        errors.add("name", "name is required");
    }
    if !is_valid_email(&req.email) {
        errors.add("email", "email must be a valid address");
    }
    if req.password.len() < 8 {
        errors.add("password", "password must be at least 8 characters");
    }
    errors.into_result()?;

    let in_use: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(&req.email)
            .fetch_one(&state.pool)
            .await?;
    if in_use > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    let password_hash = hash_password(&req.password)?;
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, is_admin, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(req.name.trim())
    .bind(req.email.trim())
    .bind(&password_hash)
    .bind(req.is_admin)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    if !req.roles.is_empty() {
        replace_roles(&state, id, &req.roles).await?;
    }

    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(access.user_id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let roles = roles_for_user(&state, id).await?;
    Ok((StatusCode::CREATED, Json(UserWithRoles { user, roles })))
}

#[utoipa::path(
    get,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User details", body = UserWithRoles),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    access: Access,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserWithRoles>> {
    access.require(perm::VIEW_USERS)?;

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;
    let roles = roles_for_user(&state, user_id).await?;
    Ok(Json(UserWithRoles { user, roles }))
}

#[utoipa::path(
    put,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = UserWithRoles),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserUpdateRequest>,
) -> AppResult<Json<UserWithRoles>> {
    access.require(perm::MANAGE_USERS)?;

    let before: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;

    if let Some(email) = &req.email {
        if !is_valid_email(email) {
            let mut errors = ValidationErrors::new();
            errors.add("email", "email must be a valid address");
            errors.into_result()?;
        }
    }

    let name = req.name.unwrap_or_else(|| before.name.clone());
    let email = req.email.unwrap_or_else(|| before.email.clone());
    let is_admin = req.is_admin.unwrap_or(before.is_admin);
    let now = utc_now();

    sqlx::query("UPDATE users SET name = ?, email = ?, is_admin = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&email)
        .bind(is_admin)
        .bind(now.to_rfc3339())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    if let Some(password) = &req.password {
        let password_hash = hash_password(password)?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(now.to_rfc3339())
            .bind(user_id.to_string())
            .execute(&state.pool)
            .await?;
    }

    if let Some(roles) = &req.roles {
        replace_roles(&state, user_id, roles).await?;
    }

    let after: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(access.user_id),
        &after,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    let roles = roles_for_user(&state, user_id).await?;
    Ok(Json(UserWithRoles { user: after, roles }))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{user_id}",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User soft-deleted"),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_USERS)?;

    if user_id == access.user_id {
        return Err(AppError::bad_request("cannot delete your own account"));
    }

    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;

    // Soft delete; leads and activity rows may still reference the user.
    sqlx::query("UPDATE users SET deleted_at = ? WHERE id = ?")
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(access.user_id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissionsResponse {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub is_super_admin: bool,
}

/// Resolve another user's effective permission set, exactly as the guard
/// would for their own requests.
#[utoipa::path(
    get,
    path = "/admin/users/{user_id}/permissions",
    tag = "Users",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Computed effective permissions", body = EffectivePermissionsResponse),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn effective_permissions(
    State(state): State<AppState>,
    access: Access,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissionsResponse>> {
    access.require(perm::VIEW_USERS)?;

    let snapshot = load_snapshot(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let profile = AccessProfile::resolve(Some(&snapshot));

    Ok(Json(EffectivePermissionsResponse {
        user_id,
        roles: profile.role_slug_list(),
        permissions: profile.permission_slugs(),
        is_super_admin: profile.is_super_admin,
    }))
}
