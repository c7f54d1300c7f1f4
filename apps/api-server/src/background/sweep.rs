//! Periodic removal of expired rate limit windows.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::JobSchedulerError;

use turnstile_core::Clock;
use turnstile_core::ports::RateLimitStore;

use super::scheduler::Scheduler;

/// Register the sweep on the scheduler.
pub async fn register_sweep(
    scheduler: &Scheduler,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> Result<uuid::Uuid, JobSchedulerError> {
    scheduler
        .add_repeated(every, move || {
            let store = store.clone();
            let clock = clock.clone();
            async move {
                run_sweep(store.as_ref(), clock.as_ref()).await;
            }
        })
        .await
}

/// Delete expired entries once. Returns how many were removed.
pub async fn run_sweep(store: &dyn RateLimitStore, clock: &dyn Clock) -> usize {
    match store.sweep(clock.now_millis()).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::debug!(removed, backend = store.backend(), "Swept expired rate limit keys");
            }
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit sweep failed");
            0
        }
    }
}
