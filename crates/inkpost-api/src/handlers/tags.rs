use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use inkpost_core::{
    models::{CreateTagRequest, UpdateTagRequest},
    validation::validate_slug,
    AppError,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

pub async fn list_tags(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.db.tags.list().await?))
}

#[tracing::instrument(skip(state, _user, req), fields(slug = %req.slug))]
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateTagRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_slug(&req.slug)?;
    let tag = state.db.tags.create(req.name.trim(), &req.slug).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[tracing::instrument(skip(state, _user, req))]
pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateTagRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut tag = state
        .db
        .tags
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", id)))?;

    if let Some(name) = req.name {
        tag.name = name.trim().to_string();
    }
    if let Some(slug) = req.slug {
        validate_slug(&slug)?;
        tag.slug = slug;
    }

    let saved = state
        .db
        .tags
        .save(&tag)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", id)))?;
    state.blog.posts.invalidate_all().await;
    Ok(Json(saved))
}

#[tracing::instrument(skip(state, _user))]
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.tags.delete(id).await? {
        return Err(AppError::NotFound(format!("Tag {} not found", id)).into());
    }
    state.blog.posts.invalidate_all().await;
    Ok(StatusCode::NO_CONTENT)
}
