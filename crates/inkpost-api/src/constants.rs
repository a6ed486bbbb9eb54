/// Prefix of every versioned API route
pub const API_PREFIX: &str = "/api/v1";

/// Interval of the rate limiter eviction task
pub const RATE_LIMIT_EVICTION_SECS: u64 = 600;

/// How long shutdown waits for background tasks
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// In-flight request cap across the whole router
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
