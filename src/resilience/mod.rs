//! Resilience wrappers around provider calls: per-provider circuit breaker,
//! token-bucket rate limiter, and retry with exponential backoff, composed
//! explicitly by [`ProviderGuard`] and looked up from a registry keyed by
//! provider name.

pub mod breaker;
pub mod rate;
pub mod retry;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HydrateError, HydrateResult};
use breaker::{BreakerConfig, CircuitBreaker, FailureKind};
use rate::TokenBucket;
use retry::RetryPolicy;

/// How long a call waits for a rate-limit token before the attempt is
/// reported as a rate-limit failure.
const TOKEN_WAIT: Duration = Duration::from_secs(2);

/// One provider's full resilience stack. Calls flow breaker -> bucket ->
/// retry; outcomes feed back into the breaker.
pub struct ProviderGuard {
    name: String,
    breaker: CircuitBreaker,
    bucket: TokenBucket,
    retry: RetryPolicy,
}

impl ProviderGuard {
    pub fn new(
        name: impl Into<String>,
        breaker_config: BreakerConfig,
        bucket: TokenBucket,
        retry: RetryPolicy,
    ) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), breaker_config),
            name,
            bucket,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `f` behind the full stack. Each retry attempt re-checks the
    /// breaker and re-acquires a token, so an attempt that trips the breaker
    /// stops the remaining budget.
    pub async fn call<T, F, Fut>(&self, f: F) -> HydrateResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = HydrateResult<T>>,
    {
        let result = self
            .retry
            .run(&self.name, || async {
                if !self.breaker.allow() {
                    return Err(HydrateError::Transient(format!(
                        "{} circuit open",
                        self.name
                    )));
                }
                if !self.bucket.acquire(TOKEN_WAIT).await {
                    self.breaker.record_failure(FailureKind::RateLimit);
                    return Err(HydrateError::RateLimited {
                        provider: self.name.clone(),
                    });
                }
                match f().await {
                    Ok(value) => {
                        self.breaker.record_success();
                        Ok(value)
                    }
                    Err(err) => {
                        match &err {
                            HydrateError::RateLimited { .. } => {
                                self.breaker.record_failure(FailureKind::RateLimit);
                            }
                            HydrateError::Transient(_) => {
                                self.breaker.record_failure(FailureKind::General);
                            }
                            // NotFound / Permanent / Corrupt are answers, not
                            // provider health signals.
                            _ => {}
                        }
                        Err(err)
                    }
                }
            })
            .await;

        if let Err(err) = &result {
            tracing::debug!(provider = %self.name, error = %err, "guarded call failed");
        }
        result
    }
}

/// Long-lived per-provider singletons, constructed once at boot.
pub struct ResilienceRegistry {
    guards: HashMap<String, Arc<ProviderGuard>>,
}

impl ResilienceRegistry {
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
        }
    }

    pub fn register(&mut self, guard: ProviderGuard) {
        self.guards.insert(guard.name.clone(), Arc::new(guard));
    }

    pub fn get(&self, provider: &str) -> Option<Arc<ProviderGuard>> {
        self.guards.get(provider).cloned()
    }
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> ProviderGuard {
        ProviderGuard::new(
            "TEST",
            BreakerConfig::default(),
            TokenBucket::new(100.0, 100.0),
            RetryPolicy {
                initial_delay: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
        )
    }

    #[tokio::test]
    async fn success_passes_through() {
        let g = guard();
        let out: HydrateResult<u32> = g.call(|| async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let g = guard();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let out: HydrateResult<u32> = g
            .call(|| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(HydrateError::Permanent("bad request".into())) }
            })
            .await;
        assert!(matches!(out, Err(HydrateError::Permanent(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_failures_open_the_breaker() {
        let g = ProviderGuard::new(
            "TEST",
            BreakerConfig {
                rate_limit_threshold: 3,
                ..BreakerConfig::default()
            },
            TokenBucket::new(100.0, 100.0),
            RetryPolicy {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
        );
        for _ in 0..3 {
            let _: HydrateResult<()> = g
                .call(|| async {
                    Err(HydrateError::RateLimited {
                        provider: "TEST".into(),
                    })
                })
                .await;
        }
        assert!(!g.breaker().allow());
    }
}
