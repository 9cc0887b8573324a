//! Bounded retry with exponential backoff and jitter for upstream calls.
//!
//! Transient failures (timeouts, 5xx, rate limiting) are retried up to the
//! configured attempt count; everything else surfaces immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{Result, TourError};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 8_000;
const DEFAULT_JITTER_FACTOR: f32 = 0.5;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Randomizes each delay by ±(factor * delay); `0.0` disables jitter.
    pub jitter_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no delays.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
        }
    }

    /// Delay before the given attempt (0-indexed; the first attempt runs
    /// immediately). Exponential: initial_delay * 2^(attempt-1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_delay_ms = self
            .initial_delay_ms
            .saturating_mul(1 << (attempt - 1).min(10));
        let capped_delay_ms = base_delay_ms.min(self.max_delay_ms);

        let final_delay_ms = if self.jitter_factor > 0.0 {
            let jitter_range = (capped_delay_ms as f32 * self.jitter_factor) as u64;
            let jitter = random_u64() % (jitter_range * 2 + 1);
            capped_delay_ms
                .saturating_sub(jitter_range)
                .saturating_add(jitter)
        } else {
            capped_delay_ms
        };

        Duration::from_millis(final_delay_ms)
    }
}

/// Runs `operation` under the policy. Transient errors are retried with
/// backoff; exhaustion converts the last error into
/// [`TourError::ServiceUnavailable`] carrying the attempt count.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_message = String::new();
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                warn!(
                    target = "retry",
                    op = op_name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Transient failure"
                );
                last_message = err.to_string();
            }
            Err(err) => return Err(err),
        }
    }
    Err(TourError::ServiceUnavailable {
        attempts: policy.max_attempts,
        message: last_message,
    })
}

/// Simple xorshift generator for jitter; not cryptographic, just enough to
/// de-synchronize concurrent retriers.
fn random_u64() -> u64 {
    use std::cell::Cell;
    use std::time::SystemTime;

    thread_local! {
        static STATE: Cell<u64> = Cell::new(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x9E37_79B9)
        );
    }

    STATE.with(|state| {
        let mut x = state.get().max(1);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    })
}
