//! Per-provider circuit breaker. Three states; rate-limit failures trip at a
//! lower threshold and hold the circuit open longer than general failures.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimit,
    General,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive rate-limit failures before opening.
    pub rate_limit_threshold: u32,
    /// Consecutive general failures before opening.
    pub failure_threshold: u32,
    /// Open duration after a rate-limit trip.
    pub rate_limit_open_for: Duration,
    /// Open duration after a general trip.
    pub failure_open_for: Duration,
    /// Probes admitted while half-open.
    pub half_open_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            rate_limit_threshold: 3,
            failure_threshold: 5,
            rate_limit_open_for: Duration::from_secs(60 * 60),
            failure_open_for: Duration::from_secs(15 * 60),
            half_open_probes: 1,
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_rate_limits: u32,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    open_for: Duration,
    probes_used: u32,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_rate_limits: 0,
                consecutive_failures: 0,
                opened_at: None,
                open_for: Duration::ZERO,
                probes_used: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Gate for the next call: true when closed, false when open, and true
    /// for at most `half_open_probes` calls once the open duration elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= inner.open_for {
                    tracing::info!(provider = %self.name, "circuit half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.probes_used = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probes_used < self.config.half_open_probes {
                    inner.probes_used += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(provider = %self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_rate_limits = 0;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probes_used = 0;
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let mut inner = self.inner.lock();
        match kind {
            FailureKind::RateLimit => inner.consecutive_rate_limits += 1,
            FailureKind::General => inner.consecutive_failures += 1,
        }

        let should_open = match inner.state {
            // Any half-open failure re-opens immediately.
            CircuitState::HalfOpen => true,
            CircuitState::Closed => match kind {
                FailureKind::RateLimit => {
                    inner.consecutive_rate_limits >= self.config.rate_limit_threshold
                }
                FailureKind::General => {
                    inner.consecutive_failures >= self.config.failure_threshold
                }
            },
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.open_for = match kind {
                FailureKind::RateLimit => self.config.rate_limit_open_for,
                FailureKind::General => self.config.failure_open_for,
            };
            inner.probes_used = 0;
            tracing::warn!(
                provider = %self.name,
                kind = ?kind,
                open_for_secs = inner.open_for.as_secs(),
                "circuit opened"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            rate_limit_threshold: 3,
            failure_threshold: 5,
            rate_limit_open_for: Duration::from_millis(40),
            failure_open_for: Duration::from_millis(20),
            half_open_probes: 1,
        }
    }

    #[test]
    fn three_rate_limit_failures_open_the_circuit() {
        let breaker = CircuitBreaker::new("GOOGLE_BOOKS", fast_config());
        for _ in 0..2 {
            breaker.record_failure(FailureKind::RateLimit);
            assert!(breaker.allow());
        }
        breaker.record_failure(FailureKind::RateLimit);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn open_elapses_to_half_open_and_single_probe_closes() {
        let breaker = CircuitBreaker::new("GOOGLE_BOOKS", fast_config());
        for _ in 0..3 {
            breaker.record_failure(FailureKind::RateLimit);
        }
        assert!(!breaker.allow());

        std::thread::sleep(Duration::from_millis(50));
        // First call after the window is the probe; the second is refused.
        assert!(breaker.allow());
        assert!(!breaker.allow());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("NYT", fast_config());
        for _ in 0..5 {
            breaker.record_failure(FailureKind::General);
        }
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.allow());
        breaker.record_failure(FailureKind::General);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn general_failures_use_higher_threshold() {
        let breaker = CircuitBreaker::new("OPEN_LIBRARY", fast_config());
        for _ in 0..4 {
            breaker.record_failure(FailureKind::General);
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        breaker.record_failure(FailureKind::General);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_counters() {
        let breaker = CircuitBreaker::new("GOOGLE_BOOKS", fast_config());
        breaker.record_failure(FailureKind::RateLimit);
        breaker.record_failure(FailureKind::RateLimit);
        breaker.record_success();
        breaker.record_failure(FailureKind::RateLimit);
        breaker.record_failure(FailureKind::RateLimit);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
