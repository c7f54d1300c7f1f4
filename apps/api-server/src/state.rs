//! Application state - shared across all handlers.

use std::sync::Arc;

use turnstile_core::ports::RateLimitStore;
use turnstile_core::{Clock, FixedWindowLimiter, NamedLimiter, PolicyError};
use turnstile_infra::InMemoryRateLimitStore;

#[cfg(feature = "redis")]
use turnstile_infra::RedisRateLimitStore;

use crate::config::{AppConfig, StoreBackend};

/// One limiter per named policy, all backed by the same store.
pub struct Limiters {
    // Indexed by `NamedLimiter as usize`, in `NamedLimiter::ALL` order.
    limiters: Vec<Arc<FixedWindowLimiter>>,
}

impl Limiters {
    pub fn build(
        config: &AppConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        let limiters = NamedLimiter::ALL
            .into_iter()
            .map(|named| {
                FixedWindowLimiter::new(
                    named.name(),
                    named.options_with(config.policy(named)),
                    store.clone(),
                    clock.clone(),
                )
                .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { limiters })
    }

    pub fn get(&self, named: NamedLimiter) -> Arc<FixedWindowLimiter> {
        self.limiters[named as usize].clone()
    }

    /// Limiters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (NamedLimiter, &Arc<FixedWindowLimiter>)> {
        NamedLimiter::ALL.into_iter().zip(self.limiters.iter())
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RateLimitStore>,
    pub limiters: Arc<Limiters>,
}

impl AppState {
    /// Build the application state with the configured store backend.
    pub async fn new(config: &AppConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store = build_store(config).await?;
        tracing::info!(backend = store.backend(), "Rate limit store ready");

        let limiters = Limiters::build(config, store.clone(), clock)?;

        for (named, limiter) in limiters.iter() {
            tracing::debug!(
                limiter = named.name(),
                window_secs = limiter.window().as_secs(),
                max_requests = limiter.max_requests(),
                "Limiter configured"
            );
        }

        tracing::info!("Application state initialized");

        Ok(Self {
            store,
            limiters: Arc::new(limiters),
        })
    }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RateLimitStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryRateLimitStore::new())),
        StoreBackend::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &AppConfig) -> anyhow::Result<Arc<dyn RateLimitStore>> {
    match RedisRateLimitStore::new(config.redis.clone()).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if config.redis.fallback_to_memory => {
            tracing::error!(
                "Failed to connect to Redis: {}. Using in-memory rate limit store.",
                e
            );
            Ok(Arc::new(InMemoryRateLimitStore::new()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_config: &AppConfig) -> anyhow::Result<Arc<dyn RateLimitStore>> {
    tracing::warn!("Built without redis feature - using in-memory rate limit store");
    Ok(Arc::new(InMemoryRateLimitStore::new()))
}
