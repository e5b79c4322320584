//! Retry with exponential backoff and jitter. The error taxonomy decides
//! retriability: transient errors use the full attempt budget, a rate limit
//! is retried once with delay, everything else returns immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{HydrateError, HydrateResult};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Upper bound of the random jitter as a fraction of the computed delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): initial *
    /// multiplier^(attempt-1), plus up to `jitter` extra.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter);
        Duration::from_secs_f64(base * (1.0 + jitter))
    }

    pub async fn run<T, F, Fut>(&self, op: &str, f: F) -> HydrateResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = HydrateResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let may_retry = attempt < self.max_attempts
                        && (err.is_retriable() || (err.is_rate_limit() && attempt == 1));
                    if !may_retry {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    #[tokio::test]
    async fn transient_errors_use_the_full_budget() {
        let calls = AtomicU32::new(0);
        let out: HydrateResult<()> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(HydrateError::Transient("boom".into())) }
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_exactly_once() {
        let calls = AtomicU32::new(0);
        let out: HydrateResult<()> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(HydrateError::RateLimited {
                        provider: "GOOGLE_BOOKS".into(),
                    })
                }
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_return_immediately() {
        let calls = AtomicU32::new(0);
        let out: HydrateResult<()> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(HydrateError::Permanent("no".into())) }
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eventual_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let out = fast_policy()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(HydrateError::Transient("first".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_grows_exponentially_with_bounded_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.2,
        };
        let d1 = policy.delay_for_attempt(1);
        let d3 = policy.delay_for_attempt(3);
        assert!(d1 >= Duration::from_millis(100) && d1 <= Duration::from_millis(120));
        assert!(d3 >= Duration::from_millis(400) && d3 <= Duration::from_millis(480));
    }
}
