//! Domain-level error types.

use thiserror::Error;

/// Store errors - only external backends can actually produce these.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Invalid limiter options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Rate limit window must be longer than zero")]
    ZeroWindow,

    #[error("Rate limit must allow at least one request per window")]
    ZeroMaxRequests,
}
