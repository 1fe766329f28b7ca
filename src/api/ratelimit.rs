//! Concurrency cap and retry policy for slow generic addons
//!
//! At most two upstream requests run at once. Transient failures (transport
//! errors, HTTP 429/503) are retried with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::ProviderError;

pub const DEFAULT_PERMITS: usize = 2;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

pub struct RateLimiter {
    permits: Semaphore,
    max_retries: u32,
    base_backoff: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(DEFAULT_PERMITS),
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    /// Override the first backoff delay (doubles on each retry)
    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `op` under a permit, retrying transient failures
    ///
    /// The permit is held across backoff sleeps. Once retries are exhausted
    /// the last error is returned.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Config("rate limiter closed".to_string()))?;

        let mut delay = self.base_backoff;
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(provider, attempt, ?delay, error = %err, "retrying upstream request");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast() -> RateLimiter {
        RateLimiter::new().with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let limiter = fast();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = limiter
            .run("generic", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::status("generic", 503))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let limiter = fast();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = limiter
            .run("generic", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::status("generic", 429))
            })
            .await;

        // One initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(ProviderError::Fetch { status, .. }) => assert_eq!(status, Some(429)),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let limiter = fast();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = limiter
            .run("generic", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::decode("generic", "bad json"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_at_most_two_concurrent_requests() {
        let limiter = Arc::new(fast());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = Arc::clone(&limiter);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .run("generic", || {
                        let active = Arc::clone(&active);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, ProviderError>(())
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= DEFAULT_PERMITS);
        assert_eq!(limiter.available_permits(), DEFAULT_PERMITS);
    }
}
