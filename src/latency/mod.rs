//! Bounded sliding-window latency sample buffer with percentile queries.
//!
//! Percentiles interpolate between bracketing ranks on a sorted copy of
//! the window rather than bucketing into fixed ranges.

use parking_lot::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Percentiles {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

pub struct LatencyWindow {
    capacity: usize,
    samples: RwLock<Vec<u64>>, // millis, oldest first
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: RwLock::new(Vec::with_capacity(capacity.min(1024))),
        }
    }

    pub fn add(&self, d: Duration) {
        let mut guard = self.samples.write();
        guard.push(d.as_millis() as u64);
        if guard.len() > self.capacity {
            let excess = guard.len() - self.capacity;
            guard.drain(0..excess);
        }
    }

    pub fn count(&self) -> usize {
        self.samples.read().len()
    }

    pub fn reset(&self) {
        self.samples.write().clear();
    }

    fn interpolate(sorted: &[u64], p: f64) -> f64 {
        let n = sorted.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 {
            return sorted[0] as f64;
        }
        let idx = (p / 100.0) * (n - 1) as f64;
        let lo = idx.floor() as usize;
        let hi = idx.ceil() as usize;
        let frac = idx - lo as f64;
        let lo_v = sorted[lo.min(n - 1)] as f64;
        let hi_v = sorted[hi.min(n - 1)] as f64;
        lo_v + (hi_v - lo_v) * frac
    }

    pub fn percentiles(&self) -> Percentiles {
        let mut sorted = self.samples.read().clone();
        sorted.sort_unstable();
        Percentiles {
            p50_ms: Self::interpolate(&sorted, 50.0),
            p95_ms: Self::interpolate(&sorted, 95.0),
            p99_ms: Self::interpolate(&sorted, 99.0),
        }
    }

    pub fn avg_ms(&self) -> f64 {
        let guard = self.samples.read();
        if guard.is_empty() {
            return 0.0;
        }
        guard.iter().sum::<u64>() as f64 / guard.len() as f64
    }

    pub fn min_ms(&self) -> u64 {
        self.samples.read().iter().copied().min().unwrap_or(0)
    }

    pub fn max_ms(&self) -> u64 {
        self.samples.read().iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_are_ordered() {
        let w = LatencyWindow::new(100);
        for ms in [10, 20, 30, 40, 50, 60, 70, 80, 90, 100] {
            w.add(Duration::from_millis(ms));
        }
        let p = w.percentiles();
        assert!(p.p50_ms <= p.p95_ms);
        assert!(p.p95_ms <= p.p99_ms);
    }

    #[test]
    fn empty_window_returns_zero() {
        let w = LatencyWindow::new(10);
        let p = w.percentiles();
        assert_eq!(p.p50_ms, 0.0);
        assert_eq!(p.p99_ms, 0.0);
    }

    #[test]
    fn capacity_is_enforced() {
        let w = LatencyWindow::new(5);
        for ms in 0..20u64 {
            w.add(Duration::from_millis(ms));
        }
        assert_eq!(w.count(), 5);
    }
}
