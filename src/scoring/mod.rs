//! Stateless scoring engine: metrics snapshot -> health score.
//!
//! Tiered latency thresholds, an error-count penalty and a load penalty
//! combine into a single clamped scalar.

use crate::breaker::CircuitState;
use crate::metrics::MetricsSummary;

#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub base_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub latency_low_ms: f64,
    pub latency_med_ms: f64,
    pub latency_high_ms: f64,
    pub penalty_low: f64,
    pub penalty_med: f64,
    pub penalty_high: f64,
    pub penalty_per_error: f64,
    pub high_load_threshold: i64,
    pub load_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 100.0,
            min_score: 0.0,
            max_score: 100.0,
            latency_low_ms: 200.0,
            latency_med_ms: 500.0,
            latency_high_ms: 1000.0,
            penalty_low: 5.0,
            penalty_med: 15.0,
            penalty_high: 30.0,
            penalty_per_error: 2.0,
            high_load_threshold: 100,
            load_penalty: 20.0,
        }
    }
}

pub fn score(summary: &MetricsSummary, config: &ScoringConfig) -> f64 {
    let mut score = config.base_score;

    let avg = summary.avg_latency_ms;
    score -= if avg >= config.latency_high_ms {
        config.penalty_high
    } else if avg >= config.latency_med_ms {
        config.penalty_med
    } else if avg >= config.latency_low_ms {
        config.penalty_low
    } else {
        0.0
    };

    let error_count = summary.gateway_errors + summary.bank_errors + summary.network_errors
        + summary.client_errors;
    score -= error_count as f64 * config.penalty_per_error;

    if summary.active_connections >= config.high_load_threshold {
        let over = (summary.active_connections - config.high_load_threshold) as f64;
        let ratio = (over / config.high_load_threshold.max(1) as f64).min(1.0);
        score -= config.load_penalty * ratio;
    }

    score.clamp(config.min_score, config.max_score)
}

/// Composite selection score per the health_score selector strategy:
/// `0.4*success_rate + 0.3*latency_score + 0.3*availability_score`.
pub fn composite_health_score(summary: &MetricsSummary, circuit: CircuitState) -> f64 {
    let latency_score = {
        let p95 = summary.percentiles.p95_ms;
        if p95 < 100.0 {
            1.0
        } else if p95 > 1000.0 {
            0.0
        } else {
            1.0 - (p95 - 100.0) / 900.0
        }
    };
    let availability_score = match circuit {
        CircuitState::Closed => 1.0,
        CircuitState::HalfOpen => 0.5,
        CircuitState::Open => 0.0,
    };
    0.4 * summary.success_rate + 0.3 * latency_score + 0.3 * availability_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::Percentiles;

    fn summary(avg: f64, p95: f64, errors: usize, active: i64, success_rate: f64) -> MetricsSummary {
        MetricsSummary {
            total_requests: 100,
            successful: (100.0 * success_rate) as u64,
            failed: 0,
            success_rate,
            active_connections: active,
            avg_latency_ms: avg,
            percentiles: Percentiles {
                p50_ms: avg,
                p95_ms: p95,
                p99_ms: p95,
            },
            gateway_errors: errors,
            bank_errors: 0,
            network_errors: 0,
            client_errors: 0,
        }
    }

    #[test]
    fn clean_metrics_score_near_base() {
        let s = summary(10.0, 20.0, 0, 0, 1.0);
        assert_eq!(score(&s, &ScoringConfig::default()), 100.0);
    }

    #[test]
    fn high_latency_is_penalized() {
        let s = summary(1200.0, 1200.0, 0, 0, 1.0);
        assert!(score(&s, &ScoringConfig::default()) < 100.0);
    }

    #[test]
    fn composite_score_in_unit_range() {
        let s = summary(10.0, 20.0, 0, 0, 1.0);
        let v = composite_health_score(&s, CircuitState::Closed);
        assert!(v >= 0.0 && v <= 1.0);
    }
}
