//! Exponential backoff retry policy with random jitter.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ScanError;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth, before jitter).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry.
    pub multiplier: f64,
    /// Upper bound of the uniform random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(64),
            multiplier: 2.0,
            max_jitter: Duration::from_secs(2),
        }
    }
}

/// Something that can wait. Swapped for a recorder in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real sleeping on the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays without waiting. For tests.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut d) = self.delays.lock() {
            d.push(delay);
        }
    }
}

/// Retries rate-limited provider calls with exponential backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy").field("config", &self.config).finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }

    /// Delay before the `attempt`-th retry (1-based), without jitter.
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn base_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Delay before the `attempt`-th retry, jitter included.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let base = self.base_delay(attempt)?;
        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return Some(base);
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        Some(base + Duration::from_millis(jitter))
    }

    /// Run `op`, retrying while it fails with a retryable error.
    ///
    /// Non-retryable errors are returned at once; a retryable error that
    /// outlives the budget is returned after the last attempt.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ScanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScanError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                what,
                                attempt,
                                max = self.config.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "rate limited, backing off"
                            );
                            self.sleeper.sleep(delay).await;
                        }
                        None => {
                            tracing::error!(what, attempts = attempt, error = %e, "max retries exceeded");
                            return Err(e);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            max_jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn delays_double_from_two_seconds() {
        let policy = RetryPolicy::new(no_jitter(5));
        let secs: Vec<u64> = (1..=5)
            .map(|n| policy.next_delay(n).unwrap().as_secs())
            .collect();
        assert_eq!(secs, [2, 4, 8, 16, 32]);
        assert!(policy.next_delay(6).is_none());
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.next_delay(1).unwrap();
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(4), "d={d:?}");
        }
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 10,
            max_backoff: Duration::from_secs(5),
            max_jitter: Duration::ZERO,
            ..Default::default()
        });
        assert_eq!(policy.next_delay(8).unwrap(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy::with_sleeper(no_jitter(5), sleeper.clone());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = policy
            .run("eth_getLogs", move || async move {
                calls.fetch_add(1, Ordering::Relaxed);
                Err(ScanError::RateLimited { endpoint: "mock".into() })
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::Relaxed), 6);
        assert_eq!(sleeper.delays().len(), 5);
    }

    #[tokio::test]
    async fn recovers_after_transient_rate_limit() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy::with_sleeper(no_jitter(5), sleeper.clone());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let value = policy
            .run("eth_blockNumber", move || async move {
                if calls.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(ScanError::RateLimited { endpoint: "mock".into() })
                } else {
                    Ok(7u64)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(sleeper.delays(), [Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy::with_sleeper(no_jitter(5), sleeper.clone());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = policy
            .run("eth_getLogs", move || async move {
                calls.fetch_add(1, Ordering::Relaxed);
                Err(ScanError::Rpc("query returned more than 10000 results".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(sleeper.delays().is_empty());
    }
}
