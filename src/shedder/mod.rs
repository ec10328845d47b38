//! Admission control / load shedding.
//!
//! CPU usage is sampled from a cached `sysinfo::System`, refreshed on
//! demand rather than on every call.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::System;

static CACHED_SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();
static LAST_REFRESH: OnceLock<Mutex<Option<Instant>>> = OnceLock::new();

fn sampled_cpu_percent() -> f32 {
    let system_lock = CACHED_SYSTEM.get_or_init(|| Mutex::new(System::new_all()));
    let last_refresh_lock = LAST_REFRESH.get_or_init(|| Mutex::new(None));

    let mut last_refresh = last_refresh_lock.lock();
    let should_refresh = last_refresh
        .map(|t| t.elapsed() >= Duration::from_secs(5))
        .unwrap_or(true);

    let mut system = system_lock.lock();
    if should_refresh {
        system.refresh_cpu_usage();
        *last_refresh = Some(Instant::now());
    }
    system.global_cpu_usage()
}

#[derive(Debug, Clone, Copy)]
pub struct ShedderConfig {
    pub max_active: u64,
    pub latency_threshold_ms: u64,
    pub cpu_threshold_pct: f32,
    pub circuit_open_threshold: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShedReason {
    InflightExceeded,
    LatencyExceeded,
    CpuExceeded,
    TooManyCircuitsOpen,
}

pub struct LoadShedder {
    config: ShedderConfig,
    inflight: AtomicI64,
    accepted: AtomicU64,
    shed: AtomicU64,
}

impl LoadShedder {
    pub fn new(config: ShedderConfig) -> Self {
        Self {
            config,
            inflight: AtomicI64::new(0),
            accepted: AtomicU64::new(0),
            shed: AtomicU64::new(0),
        }
    }

    /// Returns `None` if the request may proceed, or the reason it was
    /// shed. Accepted requests must call `release()` on completion.
    pub fn admit(&self, p99_ms: u64, open_circuits: usize) -> Option<ShedReason> {
        let inflight = self.inflight.load(Ordering::Relaxed);
        if inflight as u64 > self.config.max_active {
            self.shed.fetch_add(1, Ordering::Relaxed);
            return Some(ShedReason::InflightExceeded);
        }
        if p99_ms > self.config.latency_threshold_ms {
            self.shed.fetch_add(1, Ordering::Relaxed);
            return Some(ShedReason::LatencyExceeded);
        }
        if sampled_cpu_percent() > self.config.cpu_threshold_pct {
            self.shed.fetch_add(1, Ordering::Relaxed);
            return Some(ShedReason::CpuExceeded);
        }
        if open_circuits >= self.config.circuit_open_threshold {
            self.shed.fetch_add(1, Ordering::Relaxed);
            return Some(ShedReason::TooManyCircuitsOpen);
        }
        self.inflight.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn release(&self) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> (u64, u64) {
        (
            self.accepted.load(Ordering::Relaxed),
            self.shed.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ShedderConfig {
        ShedderConfig {
            max_active: 1,
            latency_threshold_ms: 1000,
            cpu_threshold_pct: 100.0,
            circuit_open_threshold: 100,
        }
    }

    #[test]
    fn sheds_when_inflight_exceeds_max() {
        let shedder = LoadShedder::new(config());
        assert!(shedder.admit(0, 0).is_none());
        assert!(shedder.admit(0, 0).is_none());
        assert_eq!(shedder.admit(0, 0), Some(ShedReason::InflightExceeded));
    }

    #[test]
    fn sheds_when_latency_exceeds_threshold() {
        let shedder = LoadShedder::new(config());
        assert_eq!(shedder.admit(5000, 0), Some(ShedReason::LatencyExceeded));
    }

    #[test]
    fn sheds_when_too_many_circuits_open() {
        let shedder = LoadShedder::new(ShedderConfig {
            circuit_open_threshold: 1,
            ..config()
        });
        assert_eq!(shedder.admit(0, 1), Some(ShedReason::TooManyCircuitsOpen));
    }
}
