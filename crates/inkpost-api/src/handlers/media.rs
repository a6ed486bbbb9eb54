//! Media library: multipart upload, listing, file serving and deletion.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use inkpost_core::{models::ListMediaQuery, AppError};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::HttpAppError;
use crate::state::AppState;

/// Multipart field holding the file
const FILE_FIELD: &str = "file";

#[tracing::instrument(skip(state, _user, multipart))]
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Missing file name".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let media = state
            .blog
            .media
            .upload(&file_name, content_type.as_deref(), data.to_vec())
            .await?;
        return Ok((StatusCode::CREATED, Json(media)));
    }

    Err(AppError::InvalidInput(format!("Missing '{}' field", FILE_FIELD)).into())
}

pub async fn list_media(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListMediaQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.blog.media.list(&query).await?))
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.blog.media.get(id).await?))
}

/// Serve a stored file. Keys with `..` or a leading `/` are rejected by storage.
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (bytes, mime) = state.blog.media.read(&path).await?;
    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

/// Delete the record, then schedule removal of its file. Scheduling never
/// fails the request.
#[tracing::instrument(skip(state, _user))]
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.blog.media.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
