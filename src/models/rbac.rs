use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub level: i64,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Role {
    fn entity_type() -> &'static str {
        "role"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRole {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub level: i64,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbRole> for Role {
    type Error = AppError;

    fn try_from(db: DbRole) -> Result<Self, Self::Error> {
        Ok(Role {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid role id: {err}")))?,
            name: db.name,
            slug: db.slug,
            description: db.description,
            level: db.level,
            is_system: db.is_system,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Role plus derived counts and its permission slugs, for admin listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
    pub users_count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "Content editor")]
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    #[schema(example = "Can manage posts and portfolio items")]
    pub description: Option<String>,
    #[serde(default)]
    pub level: i64,
    /// Permission slugs to grant.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub level: Option<i64>,
    /// When present, atomically replaces the role's full permission set.
    pub permissions: Option<Vec<String>>,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Permission {
    fn entity_type() -> &'static str {
        "permission"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermission {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub group_label: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPermission> for Permission {
    type Error = AppError;

    fn try_from(db: DbPermission) -> Result<Self, Self::Error> {
        Ok(Permission {
            id: Uuid::parse_str(&db.id)
                .map_err(|err| AppError::internal(format!("invalid permission id: {err}")))?,
            name: db.name,
            slug: db.slug,
            group_label: db.group_label,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Permission plus the derived count of roles referencing it.
#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionDetails {
    #[serde(flatten)]
    pub permission: Permission,
    pub roles_count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionCreateRequest {
    #[schema(example = "Export leads")]
    pub name: String,
    /// Derived from `name` when absent.
    #[schema(example = "export-leads")]
    pub slug: Option<String>,
    #[schema(example = "Leads")]
    pub group_label: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionUpdateRequest {
    pub name: Option<String>,
    /// Rejected with 409 when the permission is referenced by any role.
    pub slug: Option<String>,
    pub group_label: Option<String>,
    pub description: Option<String>,
}

