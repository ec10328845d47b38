//! Per-provider counters, latency window and timestamped error events.
//!
//! Aggregates request counts, a latency window and four timestamped
//! error-kind lists behind a read lock, with a `to_prometheus()` export.

use crate::latency::{LatencyWindow, Percentiles};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Gateway,
    Bank,
    Network,
    Client,
}

#[derive(Debug, Clone)]
struct ErrorEvent {
    at: DateTime<Utc>,
    #[allow(dead_code)]
    message: String,
}

#[derive(Default)]
struct ErrorLists {
    gateway: Vec<ErrorEvent>,
    bank: Vec<ErrorEvent>,
    network: Vec<ErrorEvent>,
    client: Vec<ErrorEvent>,
}

impl ErrorLists {
    fn list_mut(&mut self, kind: ErrorKind) -> &mut Vec<ErrorEvent> {
        match kind {
            ErrorKind::Gateway => &mut self.gateway,
            ErrorKind::Bank => &mut self.bank,
            ErrorKind::Network => &mut self.network,
            ErrorKind::Client => &mut self.client,
        }
    }
}

pub struct ProviderMetrics {
    latency: LatencyWindow,
    total_requests: std::sync::atomic::AtomicU64,
    successful: std::sync::atomic::AtomicU64,
    failed: std::sync::atomic::AtomicU64,
    active_connections: std::sync::atomic::AtomicI64,
    errors: RwLock<ErrorLists>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub active_connections: i64,
    pub avg_latency_ms: f64,
    pub percentiles: Percentiles,
    pub gateway_errors: usize,
    pub bank_errors: usize,
    pub network_errors: usize,
    pub client_errors: usize,
}

impl ProviderMetrics {
    pub fn new(latency_window_capacity: usize) -> Self {
        Self {
            latency: LatencyWindow::new(latency_window_capacity),
            total_requests: Default::default(),
            successful: Default::default(),
            failed: Default::default(),
            active_connections: Default::default(),
            errors: RwLock::new(ErrorLists::default()),
        }
    }

    pub fn record_request(&self, latency: Duration, success: bool) {
        use std::sync::atomic::Ordering::Relaxed;
        self.total_requests.fetch_add(1, Relaxed);
        if success {
            self.successful.fetch_add(1, Relaxed);
        } else {
            self.failed.fetch_add(1, Relaxed);
        }
        self.latency.add(latency);
    }

    pub fn record_error(&self, kind: ErrorKind, message: impl Into<String>) {
        let mut guard = self.errors.write();
        guard.list_mut(kind).push(ErrorEvent {
            at: Utc::now(),
            message: message.into(),
        });
    }

    pub fn inc_active(&self) {
        self.active_connections
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn dec_active(&self) {
        self.active_connections
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }

    /// Drops error events older than `window` from all four lists.
    pub fn clean_errors(&self, window: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let mut guard = self.errors.write();
        for list in [
            &mut guard.gateway,
            &mut guard.bank,
            &mut guard.network,
            &mut guard.client,
        ] {
            list.retain(|e| e.at >= cutoff);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        use std::sync::atomic::Ordering::Relaxed;
        let total = self.total_requests.load(Relaxed);
        let successful = self.successful.load(Relaxed);
        let failed = self.failed.load(Relaxed);
        let success_rate = if total == 0 {
            1.0
        } else {
            successful as f64 / total as f64
        };
        let errors = self.errors.read();
        MetricsSummary {
            total_requests: total,
            successful,
            failed,
            success_rate,
            active_connections: self.active_connections.load(Relaxed),
            avg_latency_ms: self.latency.avg_ms(),
            percentiles: self.latency.percentiles(),
            gateway_errors: errors.gateway.len(),
            bank_errors: errors.bank.len(),
            network_errors: errors.network.len(),
            client_errors: errors.client.len(),
        }
    }

    pub fn to_prometheus(&self, provider: &str) -> String {
        let s = self.summary();
        format!(
            "provider_requests_total{{provider=\"{p}\"}} {total}\n\
             provider_requests_success{{provider=\"{p}\"}} {success}\n\
             provider_requests_failed{{provider=\"{p}\"}} {failed}\n\
             provider_latency_ms_p50{{provider=\"{p}\"}} {p50}\n\
             provider_latency_ms_p95{{provider=\"{p}\"}} {p95}\n\
             provider_latency_ms_p99{{provider=\"{p}\"}} {p99}\n\
             provider_active_connections{{provider=\"{p}\"}} {active}\n",
            p = provider,
            total = s.total_requests,
            success = s.successful,
            failed = s.failed,
            p50 = s.percentiles.p50_ms,
            p95 = s.percentiles.p95_ms,
            p99 = s.percentiles.p99_ms,
            active = s.active_connections,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_defaults_to_one_when_empty() {
        let m = ProviderMetrics::new(100);
        assert_eq!(m.summary().success_rate, 1.0);
    }

    #[test]
    fn counters_are_monotonic() {
        let m = ProviderMetrics::new(100);
        m.record_request(Duration::from_millis(10), true);
        m.record_request(Duration::from_millis(20), false);
        let s = m.summary();
        assert_eq!(s.total_requests, 2);
        assert_eq!(s.successful, 1);
        assert_eq!(s.failed, 1);
    }

    #[test]
    fn error_decay_removes_old_events() {
        let m = ProviderMetrics::new(100);
        m.record_error(ErrorKind::Network, "boom");
        assert_eq!(m.summary().network_errors, 1);
        m.clean_errors(Duration::from_secs(0));
        assert_eq!(m.summary().network_errors, 0);
    }
}
