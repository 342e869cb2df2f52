//! Retry policies applied at the transport boundary.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::error::SdkError;

/// Outcome of consulting a retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after a delay.
    RetryAfter(Duration),
    /// Give up and surface the error.
    DoNotRetry,
}

/// Decides whether a failed transport attempt is repeated.
pub trait RetryPolicy: fmt::Debug + Send + Sync {
    /// `attempt` is the number of attempts made so far, starting at 1.
    fn decide(&self, error: &SdkError, attempt: u32) -> RetryDecision;

    /// Upper bound of attempts, used to report exhaustion.
    fn max_attempts(&self) -> u32;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn decide(&self, _error: &SdkError, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Exponential backoff with random jitter.
///
/// The delay before attempt `n + 1` is `base_delay * 2^(n - 1)`, capped at
/// `max_delay`, plus up to `max_jitter`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let exp = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = base_ms.saturating_mul(exp).min(max_ms);

        let jitter_max = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if jitter_max > 0 {
            rand::thread_rng().gen_range(0..=jitter_max)
        } else {
            0
        };
        Duration::from_millis(delay_ms.saturating_add(jitter_ms))
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn decide(&self, error: &SdkError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::RetryAfter(self.delay(attempt))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn no_jitter(max_attempts: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(max_attempts)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350))
            .max_jitter(Duration::ZERO)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = no_jitter(10);
        let error = SdkError::network("reset");
        assert_eq!(
            policy.decide(&error, 1),
            RetryDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            policy.decide(&error, 2),
            RetryDecision::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(
            policy.decide(&error, 3),
            RetryDecision::RetryAfter(Duration::from_millis(350))
        );
    }

    #[test]
    fn test_stops_after_max_attempts() {
        let policy = no_jitter(3);
        assert_eq!(
            policy.decide(&SdkError::timeout(), 3),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_non_retryable_errors_are_not_retried() {
        let policy = no_jitter(3);
        let error = SdkError::new(ErrorCode::GraphqlErrors, "bad field");
        assert_eq!(policy.decide(&error, 1), RetryDecision::DoNotRetry);
        assert_eq!(NoRetry.decide(&SdkError::timeout(), 1), RetryDecision::DoNotRetry);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = no_jitter(3).max_jitter(Duration::from_millis(50));
        for _ in 0..20 {
            match policy.decide(&SdkError::timeout(), 1) {
                RetryDecision::RetryAfter(delay) => {
                    assert!(delay >= Duration::from_millis(100));
                    assert!(delay <= Duration::from_millis(150));
                }
                RetryDecision::DoNotRetry => panic!("expected a retry"),
            }
        }
    }
}
