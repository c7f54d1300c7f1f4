//! Redis rate limit store, shared by every instance pointing at the same server.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use turnstile_core::RateLimitError;
use turnstile_core::ports::{RateLimitEntry, RateLimitStore};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
            key_prefix: "ratelimit".to_string(),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment-style keys (`REDIS_URL`, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            url: lookup("REDIS_URL").unwrap_or(defaults.url),
            connect_timeout: lookup("REDIS_CONNECT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            fallback_to_memory: lookup("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.fallback_to_memory),
            key_prefix: lookup("RATE_LIMIT_KEY_PREFIX").unwrap_or(defaults.key_prefix),
        }
    }
}

// Each key is a hash {count, reset_at}. The window is restarted and counted in
// one script so concurrent instances cannot interleave. The key outlives
// reset_at by 1ms because a window only ends once reset_at < now.
const INCREMENT_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])

local reset_at = tonumber(redis.call('HGET', KEYS[1], 'reset_at'))
if (not reset_at) or reset_at < now then
    reset_at = now + window
    redis.call('HSET', KEYS[1], 'count', 0, 'reset_at', reset_at)
    redis.call('PEXPIREAT', KEYS[1], reset_at + 1)
end

local count = redis.call('HINCRBY', KEYS[1], 'count', 1)
return {count, reset_at}
"#;

fn backend_error(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Backend(e.to_string())
}

/// Redis-backed store.
///
/// Expired keys are dropped by Redis itself, so [`RateLimitStore::sweep`] is a no-op.
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
    config: RedisConfig,
    script: Script,
}

impl RedisRateLimitStore {
    pub async fn new(config: RedisConfig) -> Result<Self, RateLimitError> {
        let client = Client::open(config.url.as_str()).map_err(backend_error)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RateLimitError::Backend("Connection timed out".to_string()))?
            .map_err(backend_error)?;

        tracing::info!(url = %config.url, prefix = %config.key_prefix, "Connected to Redis rate limit store");

        Ok(Self {
            conn,
            config,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, RateLimitError> {
        let mut conn = self.conn.clone();

        let (count, reset_at): (Option<u32>, Option<i64>) = redis::cmd("HMGET")
            .arg(self.make_key(key))
            .arg("count")
            .arg("reset_at")
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(count
            .zip(reset_at)
            .map(|(count, reset_at)| RateLimitEntry { count, reset_at }))
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), RateLimitError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(
                &redis_key,
                &[("count", i64::from(entry.count)), ("reset_at", entry.reset_at)],
            )
            .ignore()
            .cmd("PEXPIREAT")
            .arg(&redis_key)
            .arg(entry.reset_at.saturating_add(1))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(self.make_key(key))
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        now: i64,
        window: Duration,
    ) -> Result<RateLimitEntry, RateLimitError> {
        let mut conn = self.conn.clone();

        let result: Vec<i64> = self
            .script
            .key(self.make_key(key))
            .arg(now)
            .arg(window.as_millis() as i64)
            .invoke_async(&mut conn)
            .await
            .map_err(backend_error)?;

        match result.as_slice() {
            [count, reset_at] => Ok(RateLimitEntry {
                count: u32::try_from(*count).unwrap_or(u32::MAX),
                reset_at: *reset_at,
            }),
            other => Err(RateLimitError::Backend(format!(
                "Unexpected script reply: {:?}",
                other
            ))),
        }
    }

    async fn sweep(&self, _now: i64) -> Result<usize, RateLimitError> {
        Ok(0)
    }

    async fn len(&self) -> Result<usize, RateLimitError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.config.key_prefix);
        let mut cursor: u64 = 0;
        let mut total = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .map_err(backend_error)?;

            total += keys.len();
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(total)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::{Clock, SystemClock};

    async fn get_test_store() -> Option<RedisRateLimitStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            fallback_to_memory: false,
            key_prefix: "test_ratelimit".to_string(),
        };

        RedisRateLimitStore::new(config).await.ok()
    }

    #[test]
    fn test_config_from_lookup() {
        let config = RedisConfig::from_lookup(|key| match key {
            "REDIS_URL" => Some("redis://cache:6380".to_string()),
            "REDIS_FALLBACK_TO_MEMORY" => Some("false".to_string()),
            _ => None,
        });

        assert_eq!(config.url, "redis://cache:6380");
        assert!(!config.fallback_to_memory);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.key_prefix, "ratelimit");
    }

    #[tokio::test]
    async fn test_redis_increment_window() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = "test_user_1";
        let window = Duration::from_secs(60);
        let now = SystemClock.now_millis();
        store.delete(key).await.unwrap();

        let first = store.increment(key, now, window).await.unwrap();
        assert_eq!(first, RateLimitEntry { count: 1, reset_at: now + 60_000 });

        let second = store.increment(key, now + 500, window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.reset_at, now + 60_000);

        // Caller clock past reset_at starts a new window.
        let third = store.increment(key, now + 60_001, window).await.unwrap();
        assert_eq!(third, RateLimitEntry { count: 1, reset_at: now + 120_001 });

        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_set_get_delete() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = "test_user_2";
        let reset_at = SystemClock.now_millis() + 60_000;
        let entry = RateLimitEntry { count: 7, reset_at };

        store.set(key, entry).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), Some(entry));

        store.delete(key).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), None);
    }
}
