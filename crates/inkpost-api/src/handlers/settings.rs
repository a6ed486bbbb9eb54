use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use inkpost_core::{
    models::{BatchUpsertSettingsRequest, UpsertSettingRequest},
    AppError,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

fn check_value(setting: &UpsertSettingRequest) -> Result<(), AppError> {
    setting
        .value_type
        .check(&setting.value)
        .map_err(|reason| AppError::InvalidInput(format!("Setting '{}': {}", setting.key, reason)))
}

pub async fn list_settings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.db.settings.list().await?))
}

pub async fn get_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let setting = state
        .db
        .settings
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Setting '{}' not found", key)))?;
    Ok(Json(setting))
}

#[tracing::instrument(skip(state, _user, req), fields(key = %req.key))]
pub async fn upsert_setting(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<UpsertSettingRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    check_value(&req)?;
    Ok(Json(state.db.settings.upsert(&req).await?))
}

/// All-or-nothing: one bad value rejects the whole batch before any write.
#[tracing::instrument(skip(state, _user, req), fields(count = req.settings.len()))]
pub async fn upsert_settings_batch(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<BatchUpsertSettingsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    for setting in &req.settings {
        check_value(setting)?;
    }
    Ok(Json(state.db.settings.upsert_batch(&req.settings).await?))
}

#[tracing::instrument(skip(state, _user))]
pub async fn delete_setting(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.settings.delete(&key).await? {
        return Err(AppError::NotFound(format!("Setting '{}' not found", key)).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkpost_core::models::SettingType;

    #[test]
    fn test_check_value_names_the_key() {
        let bad = UpsertSettingRequest {
            key: "posts_per_page".into(),
            value: "ten".into(),
            value_type: SettingType::Number,
        };
        let err = check_value(&bad).unwrap_err();
        assert!(err.to_string().contains("posts_per_page"));
    }
}
