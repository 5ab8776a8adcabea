use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

// =============================================================================
// POSTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub body: String,
    pub site: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub site: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPost> for Post {
    type Error = AppError;

    fn try_from(db: DbPost) -> Result<Self, Self::Error> {
        Ok(Post {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid post id: {err}")))?,
            title: db.title,
            slug: db.slug,
            excerpt: db.excerpt,
            body: db.body,
            site: db.site,
            published: db.published,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Post with its tag slugs, as served to the admin UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostWithTags {
    #[serde(flatten)]
    pub post: Post,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostCreateRequest {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: String,
    #[schema(example = "siteA")]
    pub site: String,
    #[serde(default)]
    pub published: bool,
    /// Tag slugs; unknown slugs are rejected.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostUpdateRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
    /// When present, replaces the full tag set.
    pub tags: Option<Vec<String>>,
}

// =============================================================================
// TAGS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PostTag {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagCreateRequest {
    #[schema(example = "Case studies")]
    pub name: String,
    pub slug: Option<String>,
}

// =============================================================================
// PORTFOLIO
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub site: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub sort_order: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPortfolioItem {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub site: String,
    pub image_url: Option<String>,
    pub sort_order: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPortfolioItem> for PortfolioItem {
    type Error = AppError;

    fn try_from(db: DbPortfolioItem) -> Result<Self, Self::Error> {
        Ok(PortfolioItem {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid portfolio id: {err}")))?,
            title: db.title,
            slug: db.slug,
            description: db.description,
            site: db.site,
            image_url: db.image_url,
            sort_order: db.sort_order,
            published: db.published,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioCreateRequest {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[schema(example = "siteB")]
    pub site: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: Option<i64>,
    pub published: Option<bool>,
}
