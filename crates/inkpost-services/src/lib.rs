//! Inkpost Services Library
//!
//! Business services on top of the repositories: posts with cached keyset
//! listings, comments, the media library, the response cache and the orphan
//! sweep of the media directory.

pub mod blog;
pub mod cache;
#[cfg(feature = "cleanup")]
pub mod cleanup;

pub use blog::{CommentAuthor, CommentService, MediaService, PostService};
pub use cache::Cache;
#[cfg(feature = "cache")]
pub use cache::MemoryCache;
#[cfg(feature = "cleanup")]
pub use cleanup::{OrphanSweep, ReferencedFiles, SweepScheduler, SweepStats};
