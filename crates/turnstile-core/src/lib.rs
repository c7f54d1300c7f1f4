//! # Turnstile Core
//!
//! The domain layer of the Turnstile rate limiter.
//! This crate holds the fixed-window algorithm, key generation and the named
//! policies. Storage backends live behind the [`ports::RateLimitStore`] port.

pub mod clock;
pub mod domain;
pub mod error;
pub mod ports;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    Admission, Decision, FixedWindowLimiter, KeyGenerator, KeyPart, KeyTemplate, LimiterOptions,
    NamedLimiter, PolicyOverride, Rejection, RequestContext,
};
pub use error::{PolicyError, RateLimitError};
