use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::error::FetchError;
use super::transport::TransportError;

pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Bounded attempts with jittered exponential backoff.
///
/// The delay before attempt `n + 1` is `min_delay * 2^(n - 1)` scaled by a random
/// factor in `[1, 2)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Same backoff, different attempt budget. Zero is treated as one.
    pub fn with_attempts(self, attempts: u32) -> Self {
        Self { attempts, ..self }
    }

    /// Runs `op` until it yields a response, the error is not retryable, or the
    /// budget is spent.
    ///
    /// Any `Ok` value ends the loop immediately and is returned untouched, whatever
    /// it contains. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] carrying the last transport error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Feed service call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(FetchError::Network {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.min_delay.saturating_mul(1u32 << exponent);
        let jitter: f64 = rand::rng().random_range(1.0..2.0);
        base.mul_f64(jitter).min(self.max_delay)
    }
}
