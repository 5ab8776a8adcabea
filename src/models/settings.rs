use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// One application setting: a JSON value under a stable key, clustered into
/// groups for the UI.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Setting {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Setting {
    fn entity_type() -> &'static str {
        "setting"
    }
    fn subject_id(&self) -> Uuid {
        // Settings are keyed by string; derive a stable id from the key for
        // the activity log subject column.
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.key.as_bytes())
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSetting {
    pub key: String,
    pub value: String,
    pub group_label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbSetting> for Setting {
    fn from(db: DbSetting) -> Self {
        let value = serde_json::from_str(&db.value).unwrap_or(Value::String(db.value));
        Setting {
            key: db.key,
            value,
            group_label: db.group_label,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingUpsertRequest {
    #[schema(value_type = Object)]
    pub value: Value,
    pub group_label: Option<String>,
}
