//! Route groups under the versioned API prefix.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers::{auth, categories, comments, media, posts, settings, tags, users};
use crate::state::AppState;

/// Routes open to guests. A valid token, when sent, is still attached.
pub(super) fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/categories", get(categories::list_categories))
        .route("/tags", get(tags::list_tags))
        .route("/users/{id}", get(users::get_user))
        .route("/settings", get(settings::list_settings))
        .route("/settings/{key}", get(settings::get_setting))
        .route("/media/i/{*path}", get(media::serve_file))
}

/// Routes that need a valid token.
pub(super) fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route("/tags", post(tags::create_tag))
        .route("/tags/{id}", put(tags::update_tag).delete(tags::delete_tag))
        .route(
            "/comments/{id}",
            put(comments::update_comment_status).delete(comments::delete_comment),
        )
        .route("/media", get(media::list_media))
        .route("/media/upload", post(media::upload_media))
        .route(
            "/media/{id}",
            get(media::get_media).delete(media::delete_media),
        )
        .route("/settings", put(settings::upsert_setting))
        .route("/settings/batch", put(settings::upsert_settings_batch))
        .route("/settings/{key}", axum::routing::delete(settings::delete_setting))
        .route("/users/{id}", put(users::update_user))
}
