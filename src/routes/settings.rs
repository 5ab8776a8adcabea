use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::authz::{permissions as perm, Access};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::intent::{ScoringConfig, SCORING_SETTINGS_KEY};
use crate::models::settings::{DbSetting, Setting, SettingUpsertRequest};
use crate::utils::utc_now;

async fn fetch_setting(state: &AppState, key: &str) -> AppResult<Option<Setting>> {
    Ok(sqlx::query_as::<_, DbSetting>(
        "SELECT key, value, group_label, updated_at FROM settings WHERE key = ?",
    )
    .bind(key)
    .fetch_optional(&state.pool)
    .await?
    .map(Setting::from))
}

#[utoipa::path(
    get,
    path = "/admin/settings",
    tag = "Settings",
    responses((status = 200, description = "All settings", body = [Setting])),
    security(("bearerAuth" = []))
)]
pub async fn list_settings(
    State(state): State<AppState>,
    access: Access,
) -> AppResult<Json<Vec<Setting>>> {
    access.require(perm::MANAGE_SETTINGS)?;

    let rows = sqlx::query_as::<_, DbSetting>(
        "SELECT key, value, group_label, updated_at FROM settings ORDER BY group_label, key",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(Setting::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/settings/{key}",
    tag = "Settings",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = Setting),
        (status = 404, description = "Setting not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_setting(
    State(state): State<AppState>,
    access: Access,
    Path(key): Path<String>,
) -> AppResult<Json<Setting>> {
    access.require(perm::MANAGE_SETTINGS)?;

    fetch_setting(&state, &key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Setting not found: {key}")))
}

#[utoipa::path(
    put,
    path = "/admin/settings/{key}",
    tag = "Settings",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingUpsertRequest,
    responses(
        (status = 200, description = "Setting upserted", body = Setting),
        (status = 400, description = "Value rejected for a typed key"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn upsert_setting(
    State(state): State<AppState>,
    access: Access,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SettingUpsertRequest>,
) -> AppResult<Json<Setting>> {
    access.require(perm::MANAGE_SETTINGS)?;

    // Typed keys get validated before they are stored so the scoring engine
    // never has to cope with a half-written config.
    if key == SCORING_SETTINGS_KEY {
        serde_json::from_value::<ScoringConfig>(req.value.clone()).map_err(|err| {
            AppError::bad_request(format!("invalid scoring configuration: {err}"))
        })?;
    }

    let old = fetch_setting(&state, &key).await?;

    let value = serde_json::to_string(&req.value)
        .map_err(|err| AppError::internal(format!("serialize setting value: {err}")))?;

    sqlx::query(
        "INSERT INTO settings (key, value, group_label, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
         group_label = COALESCE(excluded.group_label, settings.group_label), \
         updated_at = excluded.updated_at",
    )
    .bind(&key)
    .bind(&value)
    .bind(&req.group_label)
    .bind(utc_now().to_rfc3339())
    .execute(&state.pool)
    .await?;

    let setting = fetch_setting(&state, &key)
        .await?
        .ok_or_else(|| AppError::internal("setting vanished after upsert"))?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(access.user_id),
        &setting,
        old.as_ref(),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(setting))
}
