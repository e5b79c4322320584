//! Token-bucket rate limiter, one bucket per provider. Acquisition blocks up
//! to a timeout; denials are reported to the circuit breaker as rate-limit
//! failures by the caller.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, waiting up to `timeout` for a refill.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_take() {
                Ok(()) => return true,
                Err(wait) => {
                    let now = Instant::now();
                    if now + wait > deadline {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Non-blocking variant.
    pub fn try_acquire(&self) -> bool {
        self.try_take().is_ok()
    }

    fn try_take(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_to_capacity() {
        let bucket = TokenBucket::new(3.0, 0.001);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::new(1.0, 100.0);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.try_acquire());
    }

    #[tokio::test]
    async fn acquire_times_out_when_refill_is_too_slow() {
        let bucket = TokenBucket::new(1.0, 0.01);
        assert!(bucket.acquire(Duration::from_millis(10)).await);
        assert!(!bucket.acquire(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let bucket = TokenBucket::new(1.0, 50.0);
        assert!(bucket.acquire(Duration::from_millis(5)).await);
        // next token arrives in ~20ms, inside the timeout
        assert!(bucket.acquire(Duration::from_millis(100)).await);
    }
}
