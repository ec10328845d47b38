//! Retry classification and backoff schedule.
//!
//! Backoff follows `base * multiplier^attempt`, capped, with a jitter
//! window applied on top.

use crate::error::ErrorCode;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.2,
        }
    }
}

pub fn is_retryable(code: ErrorCode) -> bool {
    code.is_retryable()
}

/// Computes the delay before the next attempt. `retry_after` overrides the
/// computed backoff when the provider responded with an explicit hint
/// (HTTP 429's `Retry-After` header).
pub fn next_backoff(config: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d;
    }
    let base_ms = config.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
    let capped_ms = base_ms.min(config.max_delay.as_millis() as f64);
    let jitter_range = capped_ms * config.jitter_factor;
    let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    let final_ms = (capped_ms + jitter).max(config.base_delay.as_millis() as f64 * 0.5);
    Duration::from_millis(final_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_codes_are_not_retryable() {
        assert!(!is_retryable(ErrorCode::CardDeclined));
        assert!(!is_retryable(ErrorCode::InsufficientFunds));
    }

    #[test]
    fn transient_codes_are_retryable() {
        assert!(is_retryable(ErrorCode::GatewayTimeout));
        assert!(is_retryable(ErrorCode::RateLimited));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter_factor: 0.1,
        };
        let d = next_backoff(&config, 10, None);
        assert!(d.as_millis() <= 550);
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let config = RetryConfig::default();
        let d = next_backoff(&config, 0, Some(Duration::from_secs(2)));
        assert_eq!(d, Duration::from_secs(2));
    }
}
