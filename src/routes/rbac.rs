//! Role and permission admin endpoints.
//!
//! All mutations are logged to the activity log with Critical severity.
//! System roles are protected from deletion and rename; permission slugs are
//! immutable once any role references them.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{permissions as perm, Access, SUPER_ADMIN_SLUG};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::rbac::{
    DbPermission, DbRole, Permission, PermissionCreateRequest, PermissionDetails,
    PermissionUpdateRequest, Role, RoleCreateRequest, RoleDetails, RoleUpdateRequest,
};
use crate::utils::{slugify, utc_now};

// =============================================================================
// HELPERS
// =============================================================================

async fn fetch_role(state: &AppState, role_id: Uuid) -> AppResult<Role> {
    sqlx::query_as::<_, DbRole>(
        "SELECT id, name, slug, description, level, is_system, created_at, updated_at \
         FROM roles WHERE id = ?",
    )
    .bind(role_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Role not found"))?
    .try_into()
}

async fn role_details(state: &AppState, role: Role) -> AppResult<RoleDetails> {
    let permissions = sqlx::query_scalar::<_, String>(
        "SELECT p.slug FROM permissions p \
         JOIN role_permissions rp ON rp.permission_id = p.id \
         WHERE rp.role_id = ? ORDER BY p.slug",
    )
    .bind(role.id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let users_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = ?")
        .bind(role.id.to_string())
        .fetch_one(&state.pool)
        .await?;

    Ok(RoleDetails {
        role,
        permissions,
        users_count,
    })
}

/// Resolve permission slugs to ids, rejecting unknown slugs as one 404.
async fn permission_ids_for_slugs(state: &AppState, slugs: &[String]) -> AppResult<Vec<String>> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM permissions WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;
        match id {
            Some(id) => ids.push(id),
            None => return Err(AppError::not_found(format!("unknown permission: {slug}"))),
        }
    }
    Ok(ids)
}

// =============================================================================
// ROLES
// =============================================================================

#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "RBAC",
    responses((status = 200, description = "List of roles with permissions and user counts", body = [RoleDetails])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, access: Access) -> AppResult<Json<Vec<RoleDetails>>> {
    access.require(perm::VIEW_ROLES)?;

    let rows = sqlx::query_as::<_, DbRole>(
        "SELECT id, name, slug, description, level, is_system, created_at, updated_at \
         FROM roles ORDER BY level DESC, name",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut details = Vec::with_capacity(rows.len());
    for row in rows {
        details.push(role_details(&state, row.try_into()?).await?);
    }
    Ok(Json(details))
}

#[utoipa::path(
    post,
    path = "/admin/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleDetails),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleDetails>)> {
    access.require(perm::MANAGE_ROLES)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    if slug.is_empty() {
        return Err(AppError::bad_request("role name must produce a non-empty slug"));
    }
    if slug == SUPER_ADMIN_SLUG {
        return Err(AppError::conflict("the super-admin slug is reserved"));
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE slug = ?")
        .bind(&slug)
        .fetch_one(&state.pool)
        .await?;
    if exists > 0 {
        return Err(AppError::conflict(format!("role slug already exists: {slug}")));
    }

    let permission_ids = permission_ids_for_slugs(&state, &req.permissions).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "INSERT INTO roles (id, name, slug, description, level, is_system, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&req.name)
    .bind(&slug)
    .bind(&req.description)
    .bind(req.level)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    for permission_id in &permission_ids {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(permission_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let role = fetch_role(&state, id).await?;
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(access.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(role_details(&state, role).await?)))
}

#[utoipa::path(
    get,
    path = "/admin/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role details", body = RoleDetails),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    access: Access,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<RoleDetails>> {
    access.require(perm::VIEW_ROLES)?;
    let role = fetch_role(&state, role_id).await?;
    Ok(Json(role_details(&state, role).await?))
}

#[utoipa::path(
    put,
    path = "/admin/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleDetails),
        (status = 403, description = "System role rename rejected"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
    Json(req): Json<RoleUpdateRequest>,
) -> AppResult<Json<RoleDetails>> {
    access.require(perm::MANAGE_ROLES)?;

    let before = fetch_role(&state, role_id).await?;

    if before.is_system && req.name.is_some() {
        return Err(AppError::forbidden("system roles cannot be renamed"));
    }

    let name = req.name.unwrap_or_else(|| before.name.clone());
    let description = req.description.or_else(|| before.description.clone());
    let level = req.level.unwrap_or(before.level);
    let now = utc_now();

    // Replacing the permission set and updating the row change together.
    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE roles SET name = ?, description = ?, level = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&description)
        .bind(level)
        .bind(now.to_rfc3339())
        .bind(role_id.to_string())
        .execute(&mut *tx)
        .await?;

    if let Some(slugs) = &req.permissions {
        let permission_ids = permission_ids_for_slugs(&state, slugs).await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await?;

        for permission_id in &permission_ids {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(role_id.to_string())
            .bind(permission_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    let after = fetch_role(&state, role_id).await?;
    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(access.user_id),
        &after,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(role_details(&state, after).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 403, description = "System role deletion rejected"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(role_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_ROLES)?;

    let role = fetch_role(&state, role_id).await?;
    if role.is_system {
        return Err(AppError::forbidden("system roles cannot be deleted"));
    }

    // Join rows cascade; permissions themselves are untouched.
    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(access.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PERMISSIONS
// =============================================================================

async fn fetch_permission(state: &AppState, permission_id: Uuid) -> AppResult<Permission> {
    sqlx::query_as::<_, DbPermission>(
        "SELECT id, name, slug, group_label, description, created_at, updated_at \
         FROM permissions WHERE id = ?",
    )
    .bind(permission_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Permission not found"))?
    .try_into()
}

async fn roles_count(state: &AppState, permission_id: Uuid) -> AppResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE permission_id = ?")
            .bind(permission_id.to_string())
            .fetch_one(&state.pool)
            .await?,
    )
}

#[utoipa::path(
    get,
    path = "/admin/permissions",
    tag = "RBAC",
    responses((status = 200, description = "Permission registry with role counts", body = [PermissionDetails])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    access: Access,
) -> AppResult<Json<Vec<PermissionDetails>>> {
    access.require(perm::VIEW_PERMISSIONS)?;

    let rows = sqlx::query_as::<_, DbPermission>(
        "SELECT id, name, slug, group_label, description, created_at, updated_at \
         FROM permissions ORDER BY group_label, slug",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut details = Vec::with_capacity(rows.len());
    for row in rows {
        let permission: Permission = row.try_into()?;
        let roles_count = roles_count(&state, permission.id).await?;
        details.push(PermissionDetails {
            permission,
            roles_count,
        });
    }
    Ok(Json(details))
}

#[utoipa::path(
    post,
    path = "/admin/permissions",
    tag = "RBAC",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Json(req): Json<PermissionCreateRequest>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    access.require(perm::MANAGE_PERMISSIONS)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    if slug.is_empty() {
        return Err(AppError::bad_request("permission name must produce a non-empty slug"));
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE slug = ?")
        .bind(&slug)
        .fetch_one(&state.pool)
        .await?;
    if exists > 0 {
        return Err(AppError::conflict(format!("permission slug already exists: {slug}")));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO permissions (id, name, slug, group_label, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&req.name)
    .bind(&slug)
    .bind(&req.group_label)
    .bind(&req.description)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    let permission = fetch_permission(&state, id).await?;
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(access.user_id),
        &permission,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    put,
    path = "/admin/permissions/{permission_id}",
    tag = "RBAC",
    params(("permission_id" = Uuid, Path, description = "Permission ID")),
    request_body = PermissionUpdateRequest,
    responses(
        (status = 200, description = "Permission updated", body = Permission),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Slug change rejected: referenced by roles"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(permission_id): Path<Uuid>,
    Json(req): Json<PermissionUpdateRequest>,
) -> AppResult<Json<Permission>> {
    access.require(perm::MANAGE_PERMISSIONS)?;

    let before = fetch_permission(&state, permission_id).await?;

    let slug = match req.slug {
        Some(new_slug) if new_slug != before.slug => {
            if roles_count(&state, permission_id).await? > 0 {
                return Err(AppError::conflict(
                    "slug is immutable while the permission is referenced by roles",
                ));
            }
            new_slug
        }
        _ => before.slug.clone(),
    };

    let name = req.name.unwrap_or_else(|| before.name.clone());
    let group_label = req.group_label.or_else(|| before.group_label.clone());
    let description = req.description.or_else(|| before.description.clone());

    sqlx::query(
        "UPDATE permissions SET name = ?, slug = ?, group_label = ?, description = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&slug)
    .bind(&group_label)
    .bind(&description)
    .bind(utc_now().to_rfc3339())
    .bind(permission_id.to_string())
    .execute(&state.pool)
    .await?;

    let after = fetch_permission(&state, permission_id).await?;
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
    path = "/admin/permissions/{permission_id}",
    tag = "RBAC",
    params(("permission_id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 204, description = "Permission deleted and removed from all role sets"),
        (status = 404, description = "Permission not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    access: Access,
    headers: HeaderMap,
    Path(permission_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_PERMISSIONS)?;

    let permission = fetch_permission(&state, permission_id).await?;

    // role_permissions rows cascade, which removes the slug from every
    // role's effective set on the next resolve.
    sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(permission_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(access.user_id),
        &permission,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
