//! Uniform provider client trait and a deterministic mock adapter.
//!
//! The real upstream wire formats are out of scope for this crate; the
//! mock adapter lets the dispatcher, selector and breaker be exercised
//! end to end without live credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub latency: Duration,
    pub provider_reference: String,
}

#[derive(Debug, Clone)]
pub struct ProviderFault {
    pub code: crate::error::ErrorCode,
    pub message: String,
    pub retry_after: Option<Duration>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderOutcome, ProviderFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceCheckKind {
    Kyc,
    Aml,
}

#[async_trait]
pub trait ComplianceProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, kind: ComplianceCheckKind, caller_id: &str) -> Result<(), ProviderFault>;
}

/// Deterministic mock adapter: fails every `fail_every_nth` request and
/// otherwise reports a latency drawn from `[latency_floor, latency_ceiling)`.
pub struct MockProvider {
    name: String,
    fail_every_nth: Option<u32>,
    latency_floor: Duration,
    latency_ceiling: Duration,
    counter: std::sync::atomic::AtomicU32,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_every_nth: None,
            latency_floor: Duration::from_millis(20),
            latency_ceiling: Duration::from_millis(150),
            counter: Default::default(),
        }
    }

    pub fn failing_every(mut self, n: u32) -> Self {
        self.fail_every_nth = Some(n);
        self
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderOutcome, ProviderFault> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        let floor = self.latency_floor.as_millis() as u64;
        let ceil = self.latency_ceiling.as_millis() as u64;
        let latency_ms = rand::Rng::gen_range(&mut rand::thread_rng(), floor..=ceil);
        let latency = Duration::from_millis(latency_ms);
        tokio::time::sleep(latency).await;

        if let Some(every) = self.fail_every_nth {
            if every > 0 && n % every == 0 {
                return Err(ProviderFault {
                    code: crate::error::ErrorCode::ProviderError,
                    message: "mock provider simulated failure".to_string(),
                    retry_after: None,
                });
            }
        }

        Ok(ProviderOutcome {
            latency,
            provider_reference: format!("{}-{}", self.name, request.payment_id),
        })
    }
}

/// Always-approve compliance check, standing in for a real KYC/AML vendor.
pub struct MockComplianceProvider {
    name: String,
}

impl MockComplianceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ComplianceProvider for MockComplianceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _kind: ComplianceCheckKind, _caller_id: &str) -> Result<(), ProviderFault> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_fails_on_schedule() {
        let provider = MockProvider::new("mock").failing_every(2);
        let req = ChargeRequest {
            payment_id: "p1".into(),
            amount: 100,
            currency: "USD".into(),
            idempotency_key: "k1".into(),
        };
        assert!(provider.charge(&req).await.is_ok());
        assert!(provider.charge(&req).await.is_err());
    }
}
