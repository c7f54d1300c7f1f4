//! Fixed-window counter limiter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::domain::key::{KeyGenerator, KeyTemplate, RequestContext};
use crate::error::{PolicyError, RateLimitError};
use crate::ports::{RateLimitEntry, RateLimitStore};

pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later";

/// Limiter parameters.
#[derive(Clone)]
pub struct LimiterOptions {
    pub window: Duration,
    pub max_requests: u32,
    pub message: String,
    pub key_generator: Arc<dyn KeyGenerator>,
}

impl LimiterOptions {
    /// Options with the default message, keyed by caller IP.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            message: DEFAULT_MESSAGE.to_string(),
            key_generator: Arc::new(KeyTemplate::ip()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = key_generator;
        self
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.window.is_zero() {
            return Err(PolicyError::ZeroWindow);
        }
        if self.max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests);
        }
        Ok(())
    }
}

impl fmt::Debug for LimiterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterOptions")
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A request that fits in the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub key: String,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets.
    pub reset_in: u64,
}

/// A request over the limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub key: String,
    pub limit: u32,
    /// Requests counted in the window, including this one.
    pub count: u32,
    /// Seconds the caller should wait before retrying.
    pub retry_after: u64,
    pub message: String,
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted(Admission),
    Rejected(Rejection),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted(_))
    }

    /// Classify an already-incremented entry against the limit.
    pub fn evaluate(
        key: String,
        entry: RateLimitEntry,
        max_requests: u32,
        message: &str,
        now: i64,
    ) -> Self {
        let seconds = entry.seconds_until_reset(now);

        if entry.count > max_requests {
            Decision::Rejected(Rejection {
                key,
                limit: max_requests,
                count: entry.count,
                retry_after: seconds,
                message: message.to_string(),
            })
        } else {
            Decision::Admitted(Admission {
                key,
                limit: max_requests,
                remaining: max_requests - entry.count,
                reset_in: seconds,
            })
        }
    }
}

/// Fixed-window counter limiter.
///
/// The window is fixed, not sliding: a burst straddling a boundary can pass up
/// to twice `max_requests` in a short span. Every attempt counts, including
/// rejected ones, but rejections never push `reset_at` forward.
pub struct FixedWindowLimiter {
    name: String,
    options: LimiterOptions,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(
        name: impl Into<String>,
        options: LimiterOptions,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        options.validate()?;

        Ok(Self {
            name: name.into(),
            options,
            store,
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_requests(&self) -> u32 {
        self.options.max_requests
    }

    pub fn window(&self) -> Duration {
        self.options.window
    }

    pub fn message(&self) -> &str {
        &self.options.message
    }

    /// Whether building the key requires the request body.
    pub fn reads_body(&self) -> bool {
        self.options.key_generator.reads_body()
    }

    pub fn key_for(&self, ctx: &RequestContext) -> String {
        self.options.key_generator.generate(ctx)
    }

    /// Count a request and decide whether it may proceed.
    pub async fn check(&self, ctx: &RequestContext) -> Result<Decision, RateLimitError> {
        let key = self.key_for(ctx);
        self.check_key(key).await
    }

    /// Same as [`FixedWindowLimiter::check`] for a precomputed key.
    pub async fn check_key(&self, key: impl Into<String>) -> Result<Decision, RateLimitError> {
        let key = key.into();
        let now = self.clock.now_millis();

        let entry = self
            .store
            .increment(&key, now, self.options.window)
            .await?;

        let decision = Decision::evaluate(
            key,
            entry,
            self.options.max_requests,
            &self.options.message,
            now,
        );

        match &decision {
            Decision::Admitted(admission) => tracing::debug!(
                limiter = %self.name,
                key = %admission.key,
                count = entry.count,
                limit = admission.limit,
                "Request admitted"
            ),
            Decision::Rejected(rejection) => tracing::warn!(
                limiter = %self.name,
                key = %rejection.key,
                count = rejection.count,
                limit = rejection.limit,
                retry_after = rejection.retry_after,
                "Rate limit exceeded"
            ),
        }

        Ok(decision)
    }
}

impl fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("backend", &self.store.backend())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(count: u32, reset_at: i64) -> RateLimitEntry {
        RateLimitEntry { count, reset_at }
    }

    #[test]
    fn test_evaluate_admits_up_to_limit() {
        let decision = Decision::evaluate("k".into(), entry(3, 1_000), 3, DEFAULT_MESSAGE, 0);

        assert_eq!(
            decision,
            Decision::Admitted(Admission {
                key: "k".into(),
                limit: 3,
                remaining: 0,
                reset_in: 1,
            })
        );
    }

    #[test]
    fn test_evaluate_rejects_over_limit() {
        let decision = Decision::evaluate("k".into(), entry(4, 1_000), 3, "slow down", 100);

        match decision {
            Decision::Rejected(rejection) => {
                assert_eq!(rejection.limit, 3);
                assert_eq!(rejection.count, 4);
                assert_eq!(rejection.retry_after, 1);
                assert_eq!(rejection.message, "slow down");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_options_validation() {
        assert_eq!(
            LimiterOptions::new(Duration::ZERO, 1).validate(),
            Err(PolicyError::ZeroWindow)
        );
        assert_eq!(
            LimiterOptions::new(Duration::from_secs(1), 0).validate(),
            Err(PolicyError::ZeroMaxRequests)
        );
        assert!(LimiterOptions::new(Duration::from_secs(1), 1).validate().is_ok());
    }

    #[test]
    fn test_default_options() {
        let options = LimiterOptions::new(Duration::from_secs(60), 10);
        assert_eq!(options.message, DEFAULT_MESSAGE);
        assert!(!options.key_generator.reads_body());
    }
}
