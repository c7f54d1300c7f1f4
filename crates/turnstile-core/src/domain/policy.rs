//! Named limiter policies.
//!
//! Several defaults (login, otp, register, api) were loosened for testing in
//! the deployment these come from and never tightened back. Operators can
//! override window and limit per policy with [`PolicyOverride`].

use std::sync::Arc;
use std::time::Duration;

use crate::domain::key::{KeyPart, KeyTemplate};
use crate::domain::limiter::LimiterOptions;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// The preconfigured limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedLimiter {
    Otp,
    Login,
    Registration,
    PasswordReset,
    AdminOtp,
    AdminLogin,
    Api,
    SensitiveOperation,
    AiChatbot,
}

impl NamedLimiter {
    pub const ALL: [NamedLimiter; 9] = [
        NamedLimiter::Otp,
        NamedLimiter::Login,
        NamedLimiter::Registration,
        NamedLimiter::PasswordReset,
        NamedLimiter::AdminOtp,
        NamedLimiter::AdminLogin,
        NamedLimiter::Api,
        NamedLimiter::SensitiveOperation,
        NamedLimiter::AiChatbot,
    ];

    /// Stable name, used in configuration keys and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NamedLimiter::Otp => "otp",
            NamedLimiter::Login => "login",
            NamedLimiter::Registration => "register",
            NamedLimiter::PasswordReset => "password-reset",
            NamedLimiter::AdminOtp => "admin-otp",
            NamedLimiter::AdminLogin => "admin-login",
            NamedLimiter::Api => "api",
            NamedLimiter::SensitiveOperation => "sensitive",
            NamedLimiter::AiChatbot => "ai-chatbot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|limiter| limiter.name() == name)
    }

    /// Environment-variable stem, e.g. `PASSWORD_RESET`.
    pub fn env_stem(&self) -> String {
        self.name().to_uppercase().replace('-', "_")
    }

    pub fn default_window(&self) -> Duration {
        let secs = match self {
            NamedLimiter::Otp | NamedLimiter::Login | NamedLimiter::Api => 15 * MINUTE,
            NamedLimiter::Registration
            | NamedLimiter::PasswordReset
            | NamedLimiter::SensitiveOperation => HOUR,
            NamedLimiter::AdminOtp | NamedLimiter::AdminLogin => 30 * MINUTE,
            NamedLimiter::AiChatbot => 24 * HOUR,
        };
        Duration::from_secs(secs)
    }

    pub fn default_max_requests(&self) -> u32 {
        match self {
            NamedLimiter::Otp => 50,
            NamedLimiter::Login => 100,
            NamedLimiter::Registration => 50,
            NamedLimiter::PasswordReset => 3,
            NamedLimiter::AdminOtp => 3,
            NamedLimiter::AdminLogin => 5,
            NamedLimiter::Api => 1000,
            NamedLimiter::SensitiveOperation => 10,
            NamedLimiter::AiChatbot => 10,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            NamedLimiter::Otp => "Too many OTP requests. Please try again after 15 minutes.",
            NamedLimiter::Login => "Too many login attempts. Please try again after 15 minutes.",
            NamedLimiter::Registration => {
                "Too many registration attempts. Please try again after 1 hour."
            }
            NamedLimiter::PasswordReset => {
                "Too many password reset requests. Please try again after 1 hour."
            }
            NamedLimiter::AdminOtp => {
                "Too many admin OTP requests. Please try again after 30 minutes."
            }
            NamedLimiter::AdminLogin => {
                "Too many admin login attempts. Please try again after 30 minutes."
            }
            NamedLimiter::Api => "Too many API requests. Please slow down.",
            NamedLimiter::SensitiveOperation => {
                "Too many sensitive operations. Please try again later."
            }
            NamedLimiter::AiChatbot => {
                "Daily AI chatbot limit reached (10 questions per day). Please try again tomorrow."
            }
        }
    }

    pub fn key_template(&self) -> KeyTemplate {
        use KeyPart::{Email, Ip, Token, UserId};

        match self {
            NamedLimiter::Otp => KeyTemplate::prefixed("otp", &[Ip, Email]),
            NamedLimiter::Login => KeyTemplate::prefixed("login", &[Ip, Email]),
            NamedLimiter::Registration => KeyTemplate::prefixed("register", &[Ip]),
            NamedLimiter::PasswordReset => KeyTemplate::prefixed("password-reset", &[Email]),
            NamedLimiter::AdminOtp => KeyTemplate::prefixed("admin-otp", &[Ip, Email]),
            NamedLimiter::AdminLogin => KeyTemplate::prefixed("admin-login", &[Ip, Email]),
            NamedLimiter::Api => KeyTemplate::ip(),
            NamedLimiter::SensitiveOperation => {
                KeyTemplate::prefixed("sensitive", &[UserId, Ip])
            }
            NamedLimiter::AiChatbot => KeyTemplate::prefixed("ai-chatbot", &[Token, Ip]),
        }
    }

    /// Limiter options with the default window and limit.
    pub fn options(&self) -> LimiterOptions {
        self.options_with(PolicyOverride::default())
    }

    pub fn options_with(&self, overrides: PolicyOverride) -> LimiterOptions {
        LimiterOptions::new(
            overrides.window.unwrap_or_else(|| self.default_window()),
            overrides
                .max_requests
                .unwrap_or_else(|| self.default_max_requests()),
        )
        .with_message(self.message())
        .with_key_generator(Arc::new(self.key_template()))
    }
}

/// Operator overrides for a named policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOverride {
    pub window: Option<Duration>,
    pub max_requests: Option<u32>,
}

impl PolicyOverride {
    pub fn is_empty(&self) -> bool {
        self.window.is_none() && self.max_requests.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::{KeyGenerator, RequestContext};

    #[test]
    fn test_policy_table() {
        let expected = [
            (NamedLimiter::Otp, 15 * MINUTE, 50, "otp:ip:email"),
            (NamedLimiter::Login, 15 * MINUTE, 100, "login:ip:email"),
            (NamedLimiter::Registration, HOUR, 50, "register:ip"),
            (NamedLimiter::PasswordReset, HOUR, 3, "password-reset:email"),
            (NamedLimiter::AdminOtp, 30 * MINUTE, 3, "admin-otp:ip:email"),
            (NamedLimiter::AdminLogin, 30 * MINUTE, 5, "admin-login:ip:email"),
            (NamedLimiter::Api, 15 * MINUTE, 1000, "ip"),
            (NamedLimiter::SensitiveOperation, HOUR, 10, "sensitive:userId:ip"),
            (NamedLimiter::AiChatbot, 24 * HOUR, 10, "ai-chatbot:token:ip"),
        ];

        for (limiter, window_secs, max, shape) in expected {
            let options = limiter.options();
            assert_eq!(options.window, Duration::from_secs(window_secs), "{:?}", limiter);
            assert_eq!(options.max_requests, max, "{:?}", limiter);
            assert_eq!(limiter.key_template().to_string(), shape, "{:?}", limiter);
            assert_eq!(options.message, limiter.message());
        }
    }

    #[test]
    fn test_name_round_trip() {
        for limiter in NamedLimiter::ALL {
            assert_eq!(NamedLimiter::from_name(limiter.name()), Some(limiter));
        }
        assert_eq!(NamedLimiter::from_name("nope"), None);
        assert_eq!(NamedLimiter::PasswordReset.env_stem(), "PASSWORD_RESET");
    }

    #[test]
    fn test_all_is_in_declaration_order() {
        for (index, limiter) in NamedLimiter::ALL.into_iter().enumerate() {
            assert_eq!(limiter as usize, index);
        }
    }

    #[test]
    fn test_generated_keys() {
        let ctx = RequestContext::new()
            .with_ip("1.2.3.4")
            .with_email("a@x.com")
            .with_user_id("u1")
            .with_token("tok");

        let key = |limiter: NamedLimiter| limiter.key_template().generate(&ctx);

        assert_eq!(key(NamedLimiter::Otp), "otp:1.2.3.4:a@x.com");
        assert_eq!(key(NamedLimiter::Registration), "register:1.2.3.4");
        assert_eq!(key(NamedLimiter::PasswordReset), "password-reset:a@x.com");
        assert_eq!(key(NamedLimiter::Api), "1.2.3.4");
        assert_eq!(key(NamedLimiter::SensitiveOperation), "sensitive:u1:1.2.3.4");
        assert_eq!(key(NamedLimiter::AiChatbot), "ai-chatbot:tok:1.2.3.4");
    }

    #[test]
    fn test_overrides() {
        let options = NamedLimiter::Login.options_with(PolicyOverride {
            window: None,
            max_requests: Some(5),
        });
        assert_eq!(options.max_requests, 5);
        assert_eq!(options.window, NamedLimiter::Login.default_window());
        assert!(PolicyOverride::default().is_empty());
    }
}
