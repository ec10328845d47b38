//! Per-provider circuit breaker.
//!
//! Three-state machine (Closed/Open/HalfOpen) gated by a cooldown
//! instant, with both a consecutive-failure trigger and a windowed
//! error-rate trigger.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub rate_threshold: f64,
    pub window: Duration,
    pub cooldown: Duration,
    pub half_open_max_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            rate_threshold: 0.5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    history: Vec<(Instant, bool)>,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                history: Vec::new(),
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Called before issuing a request through this provider. Returns
    /// `true` if the request may proceed (including HALF_OPEN probes).
    pub fn before_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(false);
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.history.push((now, true));
        self.prune(&mut inner, now);
        inner.consecutive_failures = 0;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.half_open_max_requests {
                    inner.state = CircuitState::Closed;
                    inner.opened_at = None;
                    inner.consecutive_successes = 0;
                }
            }
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.history.push((now, false));
        self.prune(&mut inner, now);
        inner.consecutive_failures += 1;

        if inner.state == CircuitState::HalfOpen {
            self.open(&mut inner, now);
            return;
        }

        let rate_trips = inner.history.len() >= 10 && {
            let failures = inner.history.iter().filter(|(_, ok)| !ok).count();
            failures as f64 / inner.history.len() as f64 >= self.config.rate_threshold
        };

        if inner.consecutive_failures >= self.config.failure_threshold || rate_trips {
            self.open(&mut inner, now);
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.consecutive_successes = 0;
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let window = self.config.window;
        inner.history.retain(|(t, _)| now.duration_since(*t) <= window);
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.history.clear();
        inner.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.before_request());
    }

    #[test]
    fn half_open_closes_after_successes() {
        let cb = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(0),
            half_open_max_requests: 2,
            ..Default::default()
        });
        cb.record_failure();
        assert!(cb.before_request()); // transitions to half-open
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(0),
            ..Default::default()
        });
        cb.record_failure();
        assert!(cb.before_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
