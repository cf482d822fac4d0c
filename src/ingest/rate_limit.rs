//! Token-bucket rate limiting
//!
//! The bucket starts full and refills continuously at `capacity / window`
//! tokens per second. Refill happens lazily under the same lock as the
//! deduction, measured on tokio's monotonic clock so paused-time tests see
//! exact arithmetic.

use super::config::MIN_REQUESTS_PER_SECOND;
use crate::shutdown::SharedShutdown;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Token-bucket rate limiter, safe to share between tasks.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<RateBucket>,
    capacity: f64,
    refill_per_sec: f64,
    shutdown: Option<SharedShutdown>,
}

#[derive(Debug)]
struct RateBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateBucket {
    fn refill(&mut self, now: Instant, capacity: f64, refill_per_sec: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Create a limiter allowing `capacity` calls per `window`, with bursts
    /// of at most `capacity`.
    ///
    /// # Arguments
    /// * `capacity` - Bucket size (values below 1 are raised to 1)
    /// * `window` - Time to refill an empty bucket
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window = window.as_secs_f64().max(f64::EPSILON);
        Self {
            bucket: Mutex::new(RateBucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / window,
            shutdown: None,
        }
    }

    /// Create a limiter sustaining `requests_per_second`, with a burst of one
    /// second's worth of calls.
    ///
    /// Rates below [`MIN_REQUESTS_PER_SECOND`] (or not finite) are raised to it.
    pub fn per_second(requests_per_second: f64) -> Self {
        let rate = if requests_per_second.is_finite() {
            requests_per_second.max(MIN_REQUESTS_PER_SECOND)
        } else {
            MIN_REQUESTS_PER_SECOND
        };
        let capacity = rate.ceil().clamp(1.0, f64::from(u32::MAX));
        Self::new(capacity as u32, saturating_secs(capacity / rate))
    }

    /// Make waits in [`acquire`](Self::acquire) end early on shutdown.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Wait until a token is available and reserve it.
    ///
    /// Never returns `Ok` without having deducted a token. Each wait is at
    /// most `1 / refill_rate`; the loop re-checks afterwards because another
    /// caller may have taken the token in the meantime.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        loop {
            let wait = match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            trace!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting for token");

            match &self.shutdown {
                Some(shutdown) => {
                    if !shutdown.sleep(wait).await {
                        return Err(RateLimitError::Cancelled);
                    }
                }
                None => sleep(wait).await,
            }
        }
    }

    /// Reserve a token without waiting.
    ///
    /// Returns the time until the next token accrues when none is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = self.lock();
        bucket.refill(Instant::now(), self.capacity, self.refill_per_sec);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(saturating_secs(missing / self.refill_per_sec))
        }
    }

    /// Tokens currently available, after refilling.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.lock();
        bucket.refill(Instant::now(), self.capacity, self.refill_per_sec);
        bucket.tokens
    }

    /// Bucket size
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Sustained refill rate in tokens per second
    pub fn refill_rate(&self) -> f64 {
        self.refill_per_sec
    }

    fn lock(&self) -> MutexGuard<'_, RateBucket> {
        // The bucket holds plain numbers, so a poisoned lock is still usable.
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Rate limit errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Shutdown was requested while waiting for a token
    #[error("rate limiter wait cancelled by shutdown")]
    Cancelled,
}
