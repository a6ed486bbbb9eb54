use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use inkpost_core::{
    models::{CreateCommentRequest, UpdateCommentStatusRequest},
    AppError,
};
use inkpost_services::CommentAuthor;
use std::sync::Arc;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ClientIp;

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.blog.comments.list_for_post(post_id).await?))
}

/// Post a comment. Rate limited per client IP; signed-in authors skip moderation.
#[tracing::instrument(skip_all, fields(post_id = post_id))]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(user): OptionalAuthUser,
    ClientIp(ip): ClientIp,
    Path(post_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.blog.comment_limiter.check(&ip).await?;

    let author = match user {
        Some(user) => {
            let account = state
                .db
                .users
                .get(user.id())
                .await?
                .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
            Some(CommentAuthor {
                user_id: account.id,
                name: account.nickname,
                email: account.email,
            })
        }
        None => None,
    };

    let comment = state.blog.comments.create(post_id, req, author, &ip).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[tracing::instrument(skip(state, _user, req))]
pub async fn update_comment_status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateCommentStatusRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.blog.comments.update_status(id, req.status).await?))
}

#[tracing::instrument(skip(state, _user))]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.blog.comments.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
