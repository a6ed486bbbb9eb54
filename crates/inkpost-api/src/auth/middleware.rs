use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use inkpost_core::AppError;
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::jwt::Claims;
use crate::error::HttpAppError;
use crate::state::AuthState;

/// Key under which a revoked token id is remembered.
pub fn revoked_key(jti: &str) -> String {
    format!("auth:revoked:{}", jti)
}

/// Caller identity attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.claims.sub
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Authentication required".into())))
    }
}

/// Caller identity when a valid token was sent, `None` for guests.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl<S: Send + Sync> FromRequestParts<S> for OptionalAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(|t| Some(t.trim()))
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))
}

async fn authenticate(auth: &AuthState, token: &str) -> Result<AuthUser, AppError> {
    let claims = auth.jwt.verify(token)?;
    if auth.revoked.get(&revoked_key(&claims.jti)).await.is_some() {
        return Err(AppError::Unauthorized("Token has been revoked".into()));
    }
    Ok(AuthUser { claims })
}

/// Reject requests without a valid, unrevoked bearer token.
pub async fn jwt_auth(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
        Err(e) => return HttpAppError(e).into_response(),
    };

    match authenticate(&auth, &token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// Attach the caller when a valid token is present. Bad or missing tokens
/// leave the request anonymous.
pub async fn optional_jwt_auth(
    State(auth): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers()).ok().flatten().map(str::to_string);
    if let Some(token) = token {
        match authenticate(&auth, &token).await {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid token on public route");
            }
        }
    }
    next.run(request).await
}
