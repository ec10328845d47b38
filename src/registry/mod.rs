//! Provider registry: registered providers with capabilities, priority,
//! breaker and metrics.
//!
//! Eligibility is a filter (enabled, breaker not open, capability match)
//! followed by a sort on priority tier.

use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::latency::LatencyWindow;
use crate::metrics::ProviderMetrics;
use crate::scoring::{composite_health_score, score, ScoringConfig};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Primary,
    Secondary,
    Tertiary,
}

#[derive(Debug, Clone)]
pub struct Capabilities {
    pub min_amount: i64,
    pub max_amount: i64,
    pub currencies: Vec<String>,
    pub supports_refund: bool,
    pub supports_bnpl: bool,
    pub is_compliance: bool,
}

impl Capabilities {
    pub fn covers(&self, amount: i64, currency: &str) -> bool {
        amount >= self.min_amount
            && amount <= self.max_amount
            && self.currencies.iter().any(|c| c.eq_ignore_ascii_case(currency))
    }
}

pub struct ProviderEntry {
    pub name: String,
    pub priority: PriorityTier,
    pub capabilities: Capabilities,
    pub enabled: std::sync::atomic::AtomicBool,
    pub breaker: CircuitBreaker,
    pub metrics: ProviderMetrics,
    score_bits: AtomicU64,
}

impl ProviderEntry {
    pub fn score(&self) -> f64 {
        f64::from_bits(self.score_bits.load(Ordering::Relaxed))
    }

    fn set_score(&self, v: f64) {
        self.score_bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    pub priority: PriorityTier,
    pub enabled: bool,
    pub circuit_state: CircuitState,
    pub score: f64,
    pub metrics: crate::metrics::MetricsSummary,
}

pub struct Registry {
    providers: RwLock<HashMap<String, std::sync::Arc<ProviderEntry>>>,
    compliance: RwLock<HashMap<String, std::sync::Arc<ProviderEntry>>>,
    breaker_config: BreakerConfig,
    scoring_config: ScoringConfig,
    latency_window_capacity: usize,
    global_latency: LatencyWindow,
}

impl Registry {
    pub fn new(
        breaker_config: BreakerConfig,
        scoring_config: ScoringConfig,
        latency_window_capacity: usize,
    ) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            compliance: RwLock::new(HashMap::new()),
            breaker_config,
            scoring_config,
            latency_window_capacity,
            global_latency: LatencyWindow::new(latency_window_capacity),
        }
    }

    fn new_entry(&self, name: &str, priority: PriorityTier, caps: Capabilities) -> ProviderEntry {
        ProviderEntry {
            name: name.to_string(),
            priority,
            capabilities: caps,
            enabled: std::sync::atomic::AtomicBool::new(true),
            breaker: CircuitBreaker::new(BreakerConfig {
                failure_threshold: self.breaker_config.failure_threshold,
                rate_threshold: self.breaker_config.rate_threshold,
                window: self.breaker_config.window,
                cooldown: self.breaker_config.cooldown,
                half_open_max_requests: self.breaker_config.half_open_max_requests,
            }),
            metrics: ProviderMetrics::new(self.latency_window_capacity),
            score_bits: AtomicU64::new(self.scoring_config.base_score.to_bits()),
        }
    }

    pub fn register(&self, name: &str, priority: PriorityTier, caps: Capabilities) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(AppError::new(ErrorCode::InvalidRequest, "provider name must not be empty"));
        }
        let entry = self.new_entry(name, priority, caps);
        self.providers
            .write()
            .insert(name.to_string(), std::sync::Arc::new(entry));
        Ok(())
    }

    pub fn register_compliance(&self, name: &str, caps: Capabilities) -> AppResult<()> {
        let entry = self.new_entry(name, PriorityTier::Primary, caps);
        self.compliance
            .write()
            .insert(name.to_string(), std::sync::Arc::new(entry));
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> AppResult<()> {
        let guard = self.providers.read();
        let entry = guard
            .get(name)
            .ok_or_else(|| AppError::new(ErrorCode::InvalidRequest, "unknown provider"))?;
        entry.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self, name: &str) -> AppResult<std::sync::Arc<ProviderEntry>> {
        self.providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::InvalidRequest, "unknown provider"))
    }

    /// Eligible providers for a request, sorted primary-first.
    pub fn eligible(&self, amount: i64, currency: &str) -> Vec<std::sync::Arc<ProviderEntry>> {
        let guard = self.providers.read();
        let mut list: Vec<_> = guard
            .values()
            .filter(|p| {
                p.is_enabled()
                    && p.breaker.state() != CircuitState::Open
                    && p.capabilities.covers(amount, currency)
            })
            .cloned()
            .collect();
        list.sort_by_key(|p| p.priority);
        list
    }

    pub fn first_enabled_compliance(&self) -> Option<std::sync::Arc<ProviderEntry>> {
        self.compliance
            .read()
            .values()
            .find(|p| p.is_enabled())
            .cloned()
    }

    /// Periodic re-scoring pass over all registered providers.
    pub fn refresh_scores(&self) {
        for provider in self.providers.read().values() {
            provider.metrics.clean_errors(self.breaker_config.window);
            let summary = provider.metrics.summary();
            provider.set_score(score(&summary, &self.scoring_config));
        }
    }

    pub fn composite_health_score(&self, provider: &ProviderEntry) -> f64 {
        composite_health_score(&provider.metrics.summary(), provider.breaker.state())
    }

    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        self.providers
            .read()
            .values()
            .map(|p| ProviderSnapshot {
                name: p.name.clone(),
                priority: p.priority,
                enabled: p.is_enabled(),
                circuit_state: p.breaker.state(),
                score: p.score(),
                metrics: p.metrics.summary(),
            })
            .collect()
    }

    pub fn open_circuit_count(&self) -> usize {
        self.providers
            .read()
            .values()
            .filter(|p| p.breaker.state() == CircuitState::Open)
            .count()
    }

    /// Records a completed charge's latency into the single global window
    /// the load shedder gates on, independent of which provider served it.
    pub fn record_global_latency(&self, latency: Duration) {
        self.global_latency.add(latency);
    }

    pub fn global_percentiles(&self) -> crate::latency::Percentiles {
        self.global_latency.percentiles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities {
            min_amount: 100,
            max_amount: 1_000_000,
            currencies: vec!["USD".into()],
            supports_refund: true,
            supports_bnpl: false,
            is_compliance: false,
        }
    }

    #[test]
    fn disabled_provider_not_eligible() {
        let reg = Registry::new(BreakerConfig::default(), ScoringConfig::default(), 100);
        reg.register("a", PriorityTier::Primary, caps()).unwrap();
        reg.set_enabled("a", false).unwrap();
        assert!(reg.eligible(500, "USD").is_empty());
    }

    #[test]
    fn eligible_sorted_by_priority() {
        let reg = Registry::new(BreakerConfig::default(), ScoringConfig::default(), 100);
        reg.register("secondary", PriorityTier::Secondary, caps()).unwrap();
        reg.register("primary", PriorityTier::Primary, caps()).unwrap();
        let eligible = reg.eligible(500, "USD");
        assert_eq!(eligible[0].name, "primary");
    }

    #[test]
    fn amount_outside_capability_is_ineligible() {
        let reg = Registry::new(BreakerConfig::default(), ScoringConfig::default(), 100);
        reg.register("a", PriorityTier::Primary, caps()).unwrap();
        assert!(reg.eligible(50, "USD").is_empty());
        assert!(!reg.eligible(100, "USD").is_empty());
    }
}
