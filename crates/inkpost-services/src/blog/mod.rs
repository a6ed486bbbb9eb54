//! Blog business services: posts, comments and the media library.

mod comment;
mod media;
mod post;

pub use comment::{CommentAuthor, CommentService};
pub use media::{mime_for_extension, MediaService};
pub use post::{detail_cache_key, PostService, LIST_CACHE_PATTERN};
