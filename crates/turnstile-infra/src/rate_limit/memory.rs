//! In-memory rate limit store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use turnstile_core::RateLimitError;
use turnstile_core::ports::{RateLimitEntry, RateLimitStore};

/// In-memory store using a HashMap behind an async RwLock.
///
/// `increment` holds the write lock across the whole read-increment-write, so
/// concurrent requests for one key never lose updates.
/// Note: Counters are per-process and lost on restart. Several instances behind
/// a load balancer each enforce their own limit.
pub struct InMemoryRateLimitStore {
    store: RwLock<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, RateLimitError> {
        let store = self.store.read().await;
        Ok(store.get(key).copied())
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), RateLimitError> {
        let mut store = self.store.write().await;
        store.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RateLimitError> {
        let mut store = self.store.write().await;
        store.remove(key);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        now: i64,
        window: Duration,
    ) -> Result<RateLimitEntry, RateLimitError> {
        let mut store = self.store.write().await;

        let entry = store
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::fresh(now, window));

        if entry.is_expired(now) {
            *entry = RateLimitEntry::fresh(now, window);
        }

        entry.count = entry.count.saturating_add(1);
        Ok(*entry)
    }

    async fn sweep(&self, now: i64) -> Result<usize, RateLimitError> {
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired(now));
        Ok(before - store.len())
    }

    async fn len(&self) -> Result<usize, RateLimitError> {
        Ok(self.store.read().await.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
