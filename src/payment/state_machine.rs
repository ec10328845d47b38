//! Per-payment lifecycle state machine.
//!
//! A `RwLock<HashMap<..>>`-guarded store enforcing the five-state
//! transition table below.

use crate::models::{ChargeResponse, PaymentState};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("illegal transition from {from:?} to {to:?}")]
    IllegalTransition { from: PaymentState, to: PaymentState },
    #[error("payment not found")]
    NotFound,
}

struct Record {
    state: PaymentState,
    result: Option<ChargeResponse>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct PaymentStateStore {
    records: RwLock<HashMap<String, Record>>,
}

fn legal(from: Option<PaymentState>, to: PaymentState) -> bool {
    use PaymentState::*;
    match (from, to) {
        (None, Initiated) => true,
        // A payment rejected by the compliance gate never reaches
        // PROCESSING at all; it is recorded as FAILED directly.
        (None, Failed) => true,
        (Some(Initiated), Processing) | (Some(Initiated), Cancelled) => true,
        (Some(Processing), Success) | (Some(Processing), Failed) | (Some(Processing), Cancelled) => true,
        _ => false,
    }
}

impl PaymentStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, payment_id: &str) -> Option<PaymentState> {
        self.records.read().get(payment_id).map(|r| r.state)
    }

    pub fn cached_result(&self, payment_id: &str) -> Option<ChargeResponse> {
        self.records
            .read()
            .get(payment_id)
            .and_then(|r| r.result.clone())
    }

    /// Commits a single state transition. The INITIATED->PROCESSING step is
    /// always driven through `initiate_and_process` instead so it lands as
    /// one atomic write.
    pub fn transition(&self, payment_id: &str, to: PaymentState) -> Result<(), StateError> {
        let mut guard = self.records.write();
        let current = guard.get(payment_id).map(|r| r.state);
        if !legal(current, to) {
            return match current {
                Some(from) => Err(StateError::IllegalTransition { from, to }),
                None => Err(StateError::IllegalTransition {
                    from: PaymentState::Initiated,
                    to,
                }),
            };
        }
        let now = Utc::now();
        guard
            .entry(payment_id.to_string())
            .and_modify(|r| {
                r.state = to;
                r.updated_at = now;
            })
            .or_insert(Record {
                state: to,
                result: None,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    /// Atomically moves an absent payment straight to PROCESSING.
    pub fn initiate_and_process(&self, payment_id: &str) -> Result<(), StateError> {
        let mut guard = self.records.write();
        if guard.contains_key(payment_id) {
            return Err(StateError::IllegalTransition {
                from: PaymentState::Initiated,
                to: PaymentState::Processing,
            });
        }
        let now = Utc::now();
        guard.insert(
            payment_id.to_string(),
            Record {
                state: PaymentState::Processing,
                result: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    pub fn finalize(&self, payment_id: &str, to: PaymentState, result: ChargeResponse) -> Result<(), StateError> {
        self.transition(payment_id, to)?;
        let mut guard = self.records.write();
        if let Some(record) = guard.get_mut(payment_id) {
            record.result = Some(result);
        }
        Ok(())
    }

    pub fn is_terminal(&self, payment_id: &str) -> bool {
        matches!(
            self.state(payment_id),
            Some(PaymentState::Success) | Some(PaymentState::Failed) | Some(PaymentState::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::ChargeResultData;

    fn result(status: PaymentState) -> ChargeResponse {
        ChargeResponse {
            success: status == PaymentState::Success,
            status,
            payment_id: "p1".into(),
            data: ChargeResultData {
                provider: None,
                latency_ms: None,
                error_code: None::<ErrorCode>,
                error_message: None,
            },
        }
    }

    #[test]
    fn initiate_then_process_is_atomic() {
        let store = PaymentStateStore::new();
        store.initiate_and_process("p1").unwrap();
        assert_eq!(store.state("p1"), Some(PaymentState::Processing));
    }

    #[test]
    fn failed_is_terminal_and_does_not_reopen() {
        let store = PaymentStateStore::new();
        store.initiate_and_process("p1").unwrap();
        store
            .finalize("p1", PaymentState::Failed, result(PaymentState::Failed))
            .unwrap();
        assert!(store.is_terminal("p1"));
        assert!(store.transition("p1", PaymentState::Processing).is_err());
    }

    #[test]
    fn compliance_rejection_finalizes_failed_from_absent() {
        let store = PaymentStateStore::new();
        store
            .finalize("p1", PaymentState::Failed, result(PaymentState::Failed))
            .unwrap();
        assert_eq!(store.state("p1"), Some(PaymentState::Failed));
    }

    #[test]
    fn success_is_terminal() {
        let store = PaymentStateStore::new();
        store.initiate_and_process("p1").unwrap();
        store
            .finalize("p1", PaymentState::Success, result(PaymentState::Success))
            .unwrap();
        assert!(store.transition("p1", PaymentState::Processing).is_err());
    }
}
