//! Provider selection strategies.
//!
//! `priority`, `least_latency`, `health_score`, `affinity` and
//! `round_robin` each pick among the eligible set a different way;
//! `weighted_random` is kept as a legacy strategy predating health-aware
//! routing.

use crate::kv::KvStore;
use crate::registry::ProviderEntry;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Priority,
    LeastLatency,
    HealthScore,
    Affinity,
    RoundRobin,
    WeightedRandom,
}

impl Strategy {
    pub fn parse(s: &str) -> Self {
        match s {
            "priority" => Strategy::Priority,
            "least_latency" => Strategy::LeastLatency,
            "affinity" => Strategy::Affinity,
            "round_robin" => Strategy::RoundRobin,
            "weighted_random" => Strategy::WeightedRandom,
            _ => Strategy::HealthScore,
        }
    }
}

pub struct Selector {
    strategy: Strategy,
    rng: parking_lot::Mutex<rand::rngs::StdRng>,
    affinity_ttl: Duration,
}

impl Selector {
    pub fn new(strategy: Strategy, affinity_ttl: Duration) -> Self {
        use rand::SeedableRng;
        Self {
            strategy,
            rng: parking_lot::Mutex::new(rand::rngs::StdRng::from_entropy()),
            affinity_ttl,
        }
    }

    pub async fn select(
        &self,
        eligible: &[Arc<ProviderEntry>],
        registry: &crate::registry::Registry,
        kv: &dyn KvStore,
        caller_id: Option<&str>,
        idempotency_key: &str,
    ) -> Option<Arc<ProviderEntry>> {
        if eligible.is_empty() {
            return None;
        }
        match self.strategy {
            Strategy::Priority => eligible.first().cloned(),
            Strategy::LeastLatency => eligible
                .iter()
                .min_by(|a, b| {
                    a.metrics
                        .summary()
                        .percentiles
                        .p95_ms
                        .partial_cmp(&b.metrics.summary().percentiles.p95_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned(),
            Strategy::HealthScore => self.select_by_health_score(eligible, registry),
            Strategy::Affinity => {
                self.select_affinity(eligible, registry, kv, caller_id).await
            }
            Strategy::RoundRobin => {
                let mut hasher = DefaultHasher::new();
                idempotency_key.hash(&mut hasher);
                let idx = (hasher.finish() as usize) % eligible.len();
                eligible.get(idx).cloned()
            }
            Strategy::WeightedRandom => self.select_weighted_random(eligible),
        }
    }

    fn select_by_health_score(
        &self,
        eligible: &[Arc<ProviderEntry>],
        registry: &crate::registry::Registry,
    ) -> Option<Arc<ProviderEntry>> {
        eligible
            .iter()
            .max_by(|a, b| {
                registry
                    .composite_health_score(a)
                    .partial_cmp(&registry.composite_health_score(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    async fn select_affinity(
        &self,
        eligible: &[Arc<ProviderEntry>],
        registry: &crate::registry::Registry,
        kv: &dyn KvStore,
        caller_id: Option<&str>,
    ) -> Option<Arc<ProviderEntry>> {
        if let Some(caller) = caller_id {
            let key = format!("provider_affinity:{caller}");
            if let Ok(Some(name)) = kv.get(&key).await {
                if let Some(entry) = eligible.iter().find(|p| p.name == name) {
                    return Some(entry.clone());
                }
            }
        }
        let chosen = self.select_by_health_score(eligible, registry)?;
        if let Some(caller) = caller_id {
            let key = format!("provider_affinity:{caller}");
            let _ = kv.set(&key, &chosen.name, Some(self.affinity_ttl)).await;
        }
        Some(chosen)
    }

    fn select_weighted_random(&self, eligible: &[Arc<ProviderEntry>]) -> Option<Arc<ProviderEntry>> {
        let total: f64 = eligible.iter().map(|p| p.score().max(0.01)).sum();
        if total <= 0.0 {
            return eligible.first().cloned();
        }
        let draw = self.rng.lock().gen_range(0.0..total);
        let mut cumulative = 0.0;
        for p in eligible {
            cumulative += p.score().max(0.01);
            if draw < cumulative {
                return Some(p.clone());
            }
        }
        eligible.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use crate::kv::InMemoryKvStore;
    use crate::registry::{Capabilities, PriorityTier, Registry};
    use crate::scoring::ScoringConfig;

    fn caps() -> Capabilities {
        Capabilities {
            min_amount: 0,
            max_amount: 1_000_000,
            currencies: vec!["USD".into()],
            supports_refund: true,
            supports_bnpl: false,
            is_compliance: false,
        }
    }

    #[tokio::test]
    async fn round_robin_is_deterministic() {
        let registry = Registry::new(BreakerConfig::default(), ScoringConfig::default(), 100);
        registry.register("a", PriorityTier::Primary, caps()).unwrap();
        registry.register("b", PriorityTier::Primary, caps()).unwrap();
        let eligible = registry.eligible(100, "USD");
        let kv = InMemoryKvStore::new();
        let selector = Selector::new(Strategy::RoundRobin, Duration::from_secs(60));
        let a = selector
            .select(&eligible, &registry, &kv, None, "key-1")
            .await
            .unwrap();
        let b = selector
            .select(&eligible, &registry, &kv, None, "key-1")
            .await
            .unwrap();
        assert_eq!(a.name, b.name);
    }

    #[tokio::test]
    async fn affinity_reuses_stored_provider() {
        let registry = Registry::new(BreakerConfig::default(), ScoringConfig::default(), 100);
        registry.register("a", PriorityTier::Primary, caps()).unwrap();
        registry.register("b", PriorityTier::Primary, caps()).unwrap();
        let eligible = registry.eligible(100, "USD");
        let kv = InMemoryKvStore::new();
        let selector = Selector::new(Strategy::Affinity, Duration::from_secs(60));
        let first = selector
            .select(&eligible, &registry, &kv, Some("user-1"), "key-1")
            .await
            .unwrap();
        let second = selector
            .select(&eligible, &registry, &kv, Some("user-1"), "key-2")
            .await
            .unwrap();
        assert_eq!(first.name, second.name);
    }
}
