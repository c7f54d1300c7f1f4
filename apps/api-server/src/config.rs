//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use turnstile_core::{NamedLimiter, PolicyOverride};

#[cfg(feature = "redis")]
use turnstile_infra::RedisConfig;

/// Which store holds the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "memory" => Some(StoreBackend::Memory),
            "redis" => Some(StoreBackend::Redis),
            _ => None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Honour `Forwarded` / `X-Forwarded-For` when resolving the caller IP.
    pub trust_proxy: bool,
    pub backend: StoreBackend,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    pub sweep_interval: Duration,
    pub policies: HashMap<NamedLimiter, PolicyOverride>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend = lookup("RATE_LIMIT_BACKEND")
            .map(|value| {
                StoreBackend::parse(&value).unwrap_or_else(|| {
                    tracing::warn!(value = %value, "Unknown RATE_LIMIT_BACKEND, using memory");
                    StoreBackend::Memory
                })
            })
            .unwrap_or(StoreBackend::Memory);

        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            trust_proxy: lookup("TRUST_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            backend,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_lookup(&lookup),
            sweep_interval: Duration::from_secs(
                lookup("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(300),
            ),
            policies: Self::parse_policy_overrides(&lookup),
        }
    }

    /// Parse per-policy overrides.
    /// Format: RATE_LIMIT_<NAME>_MAX_REQUESTS=<n>, RATE_LIMIT_<NAME>_WINDOW_SECS=<secs>
    /// Example: RATE_LIMIT_LOGIN_MAX_REQUESTS=5
    fn parse_policy_overrides(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> HashMap<NamedLimiter, PolicyOverride> {
        let mut policies = HashMap::new();

        for limiter in NamedLimiter::ALL {
            let stem = limiter.env_stem();

            let overrides = PolicyOverride {
                max_requests: lookup(&format!("RATE_LIMIT_{}_MAX_REQUESTS", stem))
                    .and_then(|s| s.parse().ok())
                    .filter(|max: &u32| *max > 0),
                window: lookup(&format!("RATE_LIMIT_{}_WINDOW_SECS", stem))
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .map(Duration::from_secs),
            };

            if !overrides.is_empty() {
                tracing::info!(
                    limiter = limiter.name(),
                    max_requests = ?overrides.max_requests,
                    window = ?overrides.window,
                    "Rate limit policy overridden"
                );
                policies.insert(limiter, overrides);
            }
        }

        policies
    }

    pub fn policy(&self, limiter: NamedLimiter) -> PolicyOverride {
        self.policies.get(&limiter).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(!config.trust_proxy);
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(config.policies.is_empty());
    }

    #[test]
    fn test_policy_overrides() {
        let config = config_from(&[
            ("RATE_LIMIT_LOGIN_MAX_REQUESTS", "5"),
            ("RATE_LIMIT_PASSWORD_RESET_WINDOW_SECS", "120"),
            ("RATE_LIMIT_OTP_MAX_REQUESTS", "0"),
        ]);

        assert_eq!(config.policy(NamedLimiter::Login).max_requests, Some(5));
        assert_eq!(
            config.policy(NamedLimiter::PasswordReset).window,
            Some(Duration::from_secs(120))
        );
        assert!(config.policy(NamedLimiter::Otp).is_empty());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_settings_come_from_lookup() {
        let config = config_from(&[
            ("REDIS_URL", "redis://shared:6379"),
            ("RATE_LIMIT_KEY_PREFIX", "edge"),
        ]);
        assert_eq!(config.redis.url, "redis://shared:6379");
        assert_eq!(config.redis.key_prefix, "edge");
        assert!(config.redis.fallback_to_memory);
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(
            config_from(&[("RATE_LIMIT_BACKEND", "Redis")]).backend,
            StoreBackend::Redis
        );
        assert_eq!(
            config_from(&[("RATE_LIMIT_BACKEND", "carrier-pigeon")]).backend,
            StoreBackend::Memory
        );
    }
}
