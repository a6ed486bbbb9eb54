//! Registration, login, logout and the current-user endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use inkpost_core::{
    models::{LoginRequest, LoginResponse, RegisterRequest, UserProfile},
    AppError,
};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::middleware::revoked_key;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Role of the account created by the first registration
const ADMIN_ROLE: &str = "admin";

/// Create the admin account. Closed once any user exists.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if state.db.users.count().await? > 0 {
        return Err(AppError::Forbidden("Registration is closed".to_string()).into());
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .db
        .users
        .create(
            req.username.trim(),
            req.email.trim(),
            &password_hash,
            req.nickname.trim(),
            ADMIN_ROLE,
        )
        .await?;

    tracing::info!(user_id = user.id, "Admin account registered");
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let user = state
        .db
        .users
        .find_by_login(req.login.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "Failed login attempt");
        return Err(invalid().into());
    }
    if user.status != "active" {
        return Err(AppError::Forbidden("Account is disabled".to_string()).into());
    }

    let (token, claims) = state.auth.jwt.issue(&user)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at: claims.expires_at(),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = state
        .db
        .users
        .get(user.id())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(user))
}

/// Revoke the presented token until it would have expired anyway.
#[tracing::instrument(skip(state, user), fields(user_id = user.id()))]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let remaining = (user.claims.exp - Utc::now().timestamp()).max(1);
    state
        .auth
        .revoked
        .set(
            &revoked_key(&user.claims.jti),
            "1".to_string(),
            Duration::from_secs(remaining as u64),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
