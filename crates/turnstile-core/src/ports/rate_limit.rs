//! Rate limit store port.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RateLimitError;

/// Window state for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests observed in the current window.
    pub count: u32,
    /// Epoch milliseconds at which the window ends.
    pub reset_at: i64,
}

impl RateLimitEntry {
    /// A fresh, empty window starting at `now`.
    pub fn fresh(now: i64, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now.saturating_add(window.as_millis() as i64),
        }
    }

    /// The window is over once `reset_at` lies strictly in the past.
    pub fn is_expired(&self, now: i64) -> bool {
        self.reset_at < now
    }

    /// Whole seconds until the window ends, rounded up and never negative.
    pub fn seconds_until_reset(&self, now: i64) -> u64 {
        let millis = self.reset_at.saturating_sub(now).max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Rate limit store trait - abstraction over counter backends (in-memory, Redis).
///
/// Implementations must make [`RateLimitStore::increment`] atomic per key. On a
/// multi-threaded runtime a plain `get` followed by `set` can lose updates and
/// let a key exceed its limit.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Get the entry for a key, if any.
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, RateLimitError>;

    /// Replace the entry for a key.
    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), RateLimitError>;

    /// Remove a key.
    async fn delete(&self, key: &str) -> Result<(), RateLimitError>;

    /// Start a fresh window if the key is absent or expired, then count one request.
    /// Returns the entry after the increment.
    async fn increment(
        &self,
        key: &str,
        now: i64,
        window: Duration,
    ) -> Result<RateLimitEntry, RateLimitError>;

    /// Delete every entry whose window ended before `now`.
    /// Returns the number of removed keys.
    async fn sweep(&self, now: i64) -> Result<usize, RateLimitError>;

    /// Number of keys currently held.
    async fn len(&self) -> Result<usize, RateLimitError>;

    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry() {
        let entry = RateLimitEntry::fresh(1_000, Duration::from_secs(1));
        assert_eq!(entry.count, 0);
        assert_eq!(entry.reset_at, 2_000);
    }

    #[test]
    fn test_expiry_is_strict() {
        let entry = RateLimitEntry {
            count: 3,
            reset_at: 2_000,
        };
        assert!(!entry.is_expired(1_999));
        assert!(!entry.is_expired(2_000));
        assert!(entry.is_expired(2_001));
    }

    #[test]
    fn test_seconds_until_reset_rounds_up_and_clamps() {
        let entry = RateLimitEntry {
            count: 1,
            reset_at: 10_000,
        };
        assert_eq!(entry.seconds_until_reset(0), 10);
        assert_eq!(entry.seconds_until_reset(100), 10);
        assert_eq!(entry.seconds_until_reset(9_001), 1);
        assert_eq!(entry.seconds_until_reset(10_000), 0);
        assert_eq!(entry.seconds_until_reset(12_000), 0);
    }
}
