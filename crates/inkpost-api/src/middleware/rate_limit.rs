use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use inkpost_infra::{ErrorResponse, HttpRateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::utils::extract_client_ip;

/// Per-IP request limit. Adds `X-RateLimit-*` headers; answers 429 with
/// `Retry-After` once the window is used up.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(request.headers(), socket_addr.as_ref());
    let limit = rate_limiter.limit();

    match rate_limiter.check_rate_limit(&format!("ip:{}", ip)).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;

            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                response.headers_mut().insert("X-RateLimit-Limit", value);
            }
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                response.headers_mut().insert("X-RateLimit-Remaining", value);
            }

            response
        }
        Err(reset_in) => {
            tracing::warn!(
                client_ip = %ip,
                path = %request.uri().path(),
                limit = limit,
                "HTTP rate limit exceeded"
            );

            let reset_seconds = reset_in.as_secs().max(1);
            let body = ErrorResponse {
                error: "Too many requests. Please slow down.".to_string(),
                details: None,
                error_type: None,
                code: "RATE_LIMITED".to_string(),
                recoverable: true,
                suggested_action: Some(format!("Retry after {} seconds", reset_seconds)),
            };
            let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();

            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                response.headers_mut().insert("X-RateLimit-Limit", value);
            }
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            if let Ok(value) = HeaderValue::from_str(&reset_seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }

            response
        }
    }
}
