//! Rate limiting domain.

mod key;
mod limiter;
mod policy;

pub use key::{FnKeyGenerator, KeyGenerator, KeyPart, KeyTemplate, RequestContext, UNKNOWN};
pub use limiter::{
    Admission, DEFAULT_MESSAGE, Decision, FixedWindowLimiter, LimiterOptions, Rejection,
};
pub use policy::{NamedLimiter, PolicyOverride};
