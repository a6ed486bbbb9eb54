//! Inkpost Infrastructure Library
//!
//! Shared infrastructure for the Inkpost binaries:
//! - Telemetry initialization
//! - Error response body
//! - Rate limiting (HTTP and comment posting)

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};

pub use error::ErrorResponse;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{
    spawn_bucket_eviction, CommentLimits, CommentRateLimiter, EvictExpired, HttpRateLimiter,
};
