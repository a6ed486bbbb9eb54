use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use inkpost_core::{
    models::{UpdateUserRequest, UserProfile},
    AppError,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = state
        .db
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(UserProfile::from(user)))
}

/// Update the caller's own profile.
#[tracing::instrument(skip(state, caller, req), fields(user_id = caller.id()))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if caller.id() != id {
        return Err(AppError::Forbidden("Cannot edit another user's profile".to_string()).into());
    }

    let mut user = state
        .db
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    if let Some(nickname) = req.nickname {
        user.nickname = nickname.trim().to_string();
    }
    if let Some(bio) = req.bio.into_update() {
        user.bio = bio;
    }
    if let Some(avatar_url) = req.avatar_url.into_update() {
        user.avatar_url = avatar_url;
    }

    let saved = state
        .db
        .users
        .save_profile(&user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(UserProfile::from(saved)))
}
