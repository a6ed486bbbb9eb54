use inkpost_core::Config;
use inkpost_db::{CategoryRepository, SettingRepository, TagRepository, UserRepository};
use inkpost_infra::{CommentRateLimiter, HttpRateLimiter};
use inkpost_services::{CommentService, MediaService, PostService};
use inkpost_worker::FileDeleteQueue;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::jwt::JwtService;
use inkpost_services::Cache;

/// Database-related state
#[derive(Clone)]
pub struct DatabaseState {
    pub pool: PgPool,
    pub categories: CategoryRepository,
    pub tags: TagRepository,
    pub settings: SettingRepository,
    pub users: UserRepository,
}

/// Blog services
#[derive(Clone)]
pub struct BlogState {
    pub posts: PostService,
    pub comments: CommentService,
    pub media: MediaService,
    pub comment_limiter: Arc<CommentRateLimiter>,
}

/// Token issuing and revocation
#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub users: UserRepository,
    /// Revoked token ids, kept until the token would have expired
    pub revoked: Arc<dyn Cache>,
}

/// Main application state composed of sub-states
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseState,
    pub blog: BlogState,
    pub auth: Arc<AuthState>,
    pub delete_queue: FileDeleteQueue,
    pub http_rate_limiter: Arc<HttpRateLimiter>,
    pub config: Config,
    pub is_production: bool,
}
