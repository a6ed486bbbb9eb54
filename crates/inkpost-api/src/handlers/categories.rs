use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use inkpost_core::{
    models::{CreateCategoryRequest, UpdateCategoryRequest},
    validation::validate_slug,
    AppError,
};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.db.categories.list().await?))
}

#[tracing::instrument(skip(state, _user, req), fields(slug = %req.slug))]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_slug(&req.slug)?;
    let category = state
        .db
        .categories
        .create(req.name.trim(), &req.slug, req.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[tracing::instrument(skip(state, _user, req))]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut category = state
        .db
        .categories
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

    if let Some(name) = req.name {
        category.name = name.trim().to_string();
    }
    if let Some(slug) = req.slug {
        validate_slug(&slug)?;
        category.slug = slug;
    }
    if let Some(description) = req.description.into_update() {
        category.description = description;
    }

    let saved = state
        .db
        .categories
        .save(&category)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

    state.blog.posts.invalidate_all().await;
    Ok(Json(saved))
}

#[tracing::instrument(skip(state, _user))]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.categories.delete(id).await? {
        return Err(AppError::NotFound(format!("Category {} not found", id)).into());
    }
    state.blog.posts.invalidate_all().await;
    Ok(StatusCode::NO_CONTENT)
}
