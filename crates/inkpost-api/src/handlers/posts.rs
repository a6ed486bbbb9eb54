use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use inkpost_core::models::{CreatePostRequest, ListPostsQuery, UpdatePostRequest};
use std::sync::Arc;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

/// `GET /posts`: one cursor page. Guests only see published posts.
#[tracing::instrument(skip_all)]
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(user): OptionalAuthUser,
    Query(query): Query<ListPostsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state.blog.posts.list(&query, user.is_some()).await?;
    Ok(Json(page))
}

#[tracing::instrument(skip_all, fields(post_id = id))]
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    let post = state.blog.posts.get(id, user.is_some()).await?;
    Ok(Json(post))
}

#[tracing::instrument(skip(state, user, req), fields(user_id = user.id()))]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreatePostRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let post = state.blog.posts.create(user.id(), req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[tracing::instrument(skip(state, _user, req))]
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdatePostRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let post = state.blog.posts.update(id, req).await?;
    Ok(Json(post))
}

#[tracing::instrument(skip(state, _user))]
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.blog.posts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
