//! # Turnstile Infrastructure
//!
//! Concrete implementations of the store port defined in `turnstile-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis-backed store shared across instances

pub mod rate_limit;

// Re-exports - In-Memory
pub use rate_limit::InMemoryRateLimitStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisRateLimitStore};
