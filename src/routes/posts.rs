use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{permissions as perm, Access};
use crate::errors::{AppError, AppResult};
use crate::models::content::{
    DbPost, Post, PostCreateRequest, PostTag, PostUpdateRequest, PostWithTags, TagCreateRequest,
};
use crate::utils::{slugify, utc_now};

async fn fetch_post(state: &AppState, id: Uuid) -> AppResult<Post> {
    sqlx::query_as::<_, DbPost>(
        "SELECT id, title, slug, excerpt, body, site, published, created_at, updated_at \
         FROM posts WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Post not found"))?
    .try_into()
}

async fn tags_for_post(state: &AppState, post_id: Uuid) -> AppResult<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT t.slug FROM post_tags t \
         JOIN post_tag_assignments a ON a.tag_id = t.id \
         WHERE a.post_id = ? ORDER BY t.slug",
    )
    .bind(post_id.to_string())
    .fetch_all(&state.pool)
    .await?)
}

/// Replace a post's tag set. Unknown tag slugs reject the request.
async fn replace_tags(state: &AppState, post_id: Uuid, slugs: &[String]) -> AppResult<()> {
    let mut tag_ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM post_tags WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;
        match id {
            Some(id) => tag_ids.push(id),
            None => return Err(AppError::not_found(format!("unknown tag: {slug}"))),
        }
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM post_tag_assignments WHERE post_id = ?")
        .bind(post_id.to_string())
        .execute(&mut *tx)
        .await?;
    for tag_id in &tag_ids {
        sqlx::query("INSERT INTO post_tag_assignments (post_id, tag_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id.to_string())
            .bind(tag_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/admin/posts",
    tag = "Content",
    responses((status = 200, description = "List posts", body = [PostWithTags])),
    security(("bearerAuth" = []))
)]
pub async fn list_posts(State(state): State<AppState>, access: Access) -> AppResult<Json<Vec<PostWithTags>>> {
    access.require(perm::VIEW_CONTENT)?;

    let rows = sqlx::query_as::<_, DbPost>(
        "SELECT id, title, slug, excerpt, body, site, published, created_at, updated_at \
         FROM posts WHERE deleted_at IS NULL ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let post: Post = row.try_into()?;
        let tags = tags_for_post(&state, post.id).await?;
        posts.push(PostWithTags { post, tags });
    }
    Ok(Json(posts))
}

#[utoipa::path(
    post,
    path = "/admin/posts",
    tag = "Content",
    request_body = PostCreateRequest,
    responses(
        (status = 201, description = "Post created", body = PostWithTags),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_post(
    State(state): State<AppState>,
    access: Access,
    Json(req): Json<PostCreateRequest>,
) -> AppResult<(StatusCode, Json<PostWithTags>)> {
    access.require(perm::MANAGE_CONTENT)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.title));
    if slug.is_empty() {
        return Err(AppError::bad_request("title must produce a non-empty slug"));
    }

    let exists: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND deleted_at IS NULL")
            .bind(&slug)
            .fetch_one(&state.pool)
            .await?;
    if exists > 0 {
        return Err(AppError::conflict(format!("post slug already exists: {slug}")));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO posts (id, title, slug, excerpt, body, site, published, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&req.title)
    .bind(&slug)
    .bind(&req.excerpt)
    .bind(&req.body)
    .bind(&req.site)
    .bind(req.published)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.pool)
    .await?;

    if !req.tags.is_empty() {
        replace_tags(&state, id, &req.tags).await?;
    }

    let post = fetch_post(&state, id).await?;
    let tags = tags_for_post(&state, id).await?;
    Ok((StatusCode::CREATED, Json(PostWithTags { post, tags })))
}

#[utoipa::path(
    get,
    path = "/admin/posts/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post details", body = PostWithTags),
        (status = 404, description = "Post not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_post(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostWithTags>> {
    access.require(perm::VIEW_CONTENT)?;
    let post = fetch_post(&state, id).await?;
    let tags = tags_for_post(&state, id).await?;
    Ok(Json(PostWithTags { post, tags }))
}

#[utoipa::path(
    put,
    path = "/admin/posts/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = PostUpdateRequest,
    responses(
        (status = 200, description = "Post updated", body = PostWithTags),
        (status = 404, description = "Post not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_post(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
    Json(req): Json<PostUpdateRequest>,
) -> AppResult<Json<PostWithTags>> {
    access.require(perm::MANAGE_CONTENT)?;

    let before = fetch_post(&state, id).await?;

    let title = req.title.unwrap_or_else(|| before.title.clone());
    let excerpt = req.excerpt.or_else(|| before.excerpt.clone());
    let body = req.body.unwrap_or_else(|| before.body.clone());
    let published = req.published.unwrap_or(before.published);

    sqlx::query(
        "UPDATE posts SET title = ?, excerpt = ?, body = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&excerpt)
    .bind(&body)
    .bind(published)
    .bind(utc_now().to_rfc3339())
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    if let Some(tags) = &req.tags {
        replace_tags(&state, id, tags).await?;
    }

    let post = fetch_post(&state, id).await?;
    let tags = tags_for_post(&state, id).await?;
    Ok(Json(PostWithTags { post, tags }))
}

#[utoipa::path(
    delete,
    path = "/admin/posts/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post soft-deleted"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_post(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_CONTENT)?;

    fetch_post(&state, id).await?;
    sqlx::query("UPDATE posts SET deleted_at = ? WHERE id = ?")
        .bind(utc_now().to_rfc3339())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// TAGS
// =============================================================================

#[utoipa::path(
    get,
    path = "/admin/tags",
    tag = "Content",
    responses((status = 200, description = "List tags", body = [PostTag])),
    security(("bearerAuth" = []))
)]
pub async fn list_tags(State(state): State<AppState>, access: Access) -> AppResult<Json<Vec<PostTag>>> {
    access.require(perm::VIEW_CONTENT)?;

    let tags = sqlx::query_as::<_, PostTag>(
        "SELECT id, name, slug, created_at, updated_at FROM post_tags ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(tags))
}

#[utoipa::path(
    post,
    path = "/admin/tags",
    tag = "Content",
    request_body = TagCreateRequest,
    responses(
        (status = 201, description = "Tag created", body = PostTag),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_tag(
    State(state): State<AppState>,
    access: Access,
    Json(req): Json<TagCreateRequest>,
) -> AppResult<(StatusCode, Json<PostTag>)> {
    access.require(perm::MANAGE_CONTENT)?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    if slug.is_empty() {
        return Err(AppError::bad_request("tag name must produce a non-empty slug"));
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_tags WHERE slug = ?")
        .bind(&slug)
        .fetch_one(&state.pool)
        .await?;
    if exists > 0 {
        return Err(AppError::conflict(format!("tag slug already exists: {slug}")));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query("INSERT INTO post_tags (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(&req.name)
        .bind(&slug)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&state.pool)
        .await?;

    let tag = sqlx::query_as::<_, PostTag>(
        "SELECT id, name, slug, created_at, updated_at FROM post_tags WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    delete,
    path = "/admin/tags/{id}",
    tag = "Content",
    params(("id" = Uuid, Path, description = "Tag id")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 404, description = "Tag not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_tag(
    State(state): State<AppState>,
    access: Access,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    access.require(perm::MANAGE_CONTENT)?;

    let deleted = sqlx::query("DELETE FROM post_tags WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("Tag not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
