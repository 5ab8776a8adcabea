use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{permissions as perm, Access};
use crate::errors::{AppError, AppResult};
use crate::models::content::{
    DbPortfolioItem, PortfolioCreateRequest, PortfolioItem, PortfolioUpdateRequest,
};
use crate::utils::{slugify, utc_now};

const COLUMNS: &str =
    "id, title, slug, description, site, image_url, sort_order, published, created_at, updated_at";

async fn fetch_item(state: &AppState, id: Uuid) -> AppResult<PortfolioItem> {
    sqlx::query_as::<_, DbPortfolioItem>(&format!(
        "SELECT {COLUMNS} FROM portfolio_items WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Portfolio item not found"))?
    .try_into()
}

#[utoipa::path(
    get,
    path = "/admin/portfolio",
    tag = "Content",
    responses((status = 200, description = "List portfolio items", body = [PortfolioItem])),
    security(("bearerAuth" = []))
)]
pub async fn list_items(
    State(state): State<AppState>,
    access: Access,
) -> AppResult<Json<Vec<PortfolioItem>>> {
    access.require(perm::VIEW_CONTENT)?;

    let rows = sqlx::query_as::<_, DbPortfolioItem>(&format!(
        "SELECT {COLUMNS} FROM portfolio_items WHERE deleted_at IS NULL \
         ORDER BY sort_order, created_at DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    rows.into_iter()
        .map(PortfolioItem::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/admin/portfolio",
    tag = "Content",
    request_body = PortfolioCreateRequest,
    responses(
        (status = 201, description = "Portfolio item created", body = PortfolioItem),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_item(
    State(state): State<AppState>,
    access: Access,
    Json(req): Json<PortfolioCreateRequest>,
) -> AppResult<(StatusCode, Json<PortfolioItem>)> {
    access.require(perm::MANAGE_CONTENT)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.title));
    if slug.is_empty() {
        return Err(AppError::bad_request("title must produce a non-empty slug"));
    }

    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM portfolio_items WHERE slug = ? AND deleted_at IS NULL",
    )
    .bind(&slug)
    .fetch_one(&state.pool)
    .await?;
    if exists > 0 {
        return Err(AppError::conflict(format!(
            "portfolio slug already exists: {slug}"
        )));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO portfolio_items \
         (id, title, slug, description, site, image_url, sort_order, published, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&req.title)
    .bind(&slug)
    .bind(&req.description)
    .bind(&req.site)
    .bind(&req.image_url)
    .bind(req.sort_order)
    .bind(req.published)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    let item = fetch_item(&state, id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/admin/portfolio/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Portfolio item id")),
    responses(
        (status = 200, description = "Portfolio item", body = PortfolioItem),
        (status = 404, description = "Portfolio item not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_item(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PortfolioItem>> {
    access.require(perm::VIEW_CONTENT)?;
    Ok(Json(fetch_item(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/portfolio/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Portfolio item id")),
    request_body = PortfolioUpdateRequest,
    responses(
        (status = 200, description = "Portfolio item updated", body = PortfolioItem),
        (status = 404, description = "Portfolio item not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_item(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
    Json(req): Json<PortfolioUpdateRequest>,
) -> AppResult<Json<PortfolioItem>> {
    access.require(perm::MANAGE_CONTENT)?;

    let before = fetch_item(&state, id).await?;

    let title = req.title.unwrap_or_else(|| before.title.clone());
    let description = req.description.or_else(|| before.description.clone());
    let image_url = req.image_url.or_else(|| before.image_url.clone());
    let sort_order = req.sort_order.unwrap_or(before.sort_order);
    let published = req.published.unwrap_or(before.published);

    sqlx::query(
        "UPDATE portfolio_items SET title = ?, description = ?, image_url = ?, \
         sort_order = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&description)
    .bind(&image_url)
    .bind(sort_order)
    .bind(published)
    .bind(utc_now().to_rfc3339())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_item(&state, id).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/portfolio/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Portfolio item id")),
    responses(
        (status = 204, description = "Portfolio item soft-deleted"),
        (status = 404, description = "Portfolio item not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_item(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_CONTENT)?;

    fetch_item(&state, id).await?;
    sqlx::query("UPDATE portfolio_items SET deleted_at = ? WHERE id = ?")
        .bind(utc_now().to_rfc3339())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
