//! Database repositories for data access layer
//!
//! Repositories are organized into blog/ (posts, taxonomy, comments, users,
//! settings), media/ (the media library) and stream (the durable delete
//! queue tables). Each repository owns a pool handle and provides the
//! queries for one entity.
//
// Blog repositories
pub mod blog;
//
// Media library
pub mod media;
//
// Keyset pagination SQL rendering
pub mod seek;
//
// Durable stream with consumer groups
pub mod stream;

pub use blog::{
    CategoryRepository, CommentRepository, PostRepository, SettingRepository, TagRepository,
    UserRepository,
};
pub use media::MediaRepository;
pub use stream::{StreamEntry, StreamRepository};
