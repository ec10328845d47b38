//! Per-payment notification bus.
//!
//! A per-payment subscriber set rather than one global broadcast
//! channel, since notifications must be scoped to the payment a client
//! is watching. Subscribing replays the last known result before
//! streaming subsequent updates.

use crate::models::ChargeResponse;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;

pub struct NotificationBus {
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<ChargeResponse>>>>,
    last_result: RwLock<HashMap<String, ChargeResponse>>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            last_result: RwLock::new(HashMap::new()),
        }
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a payment id, immediately returning the cached
    /// result (if any) alongside the receiver for subsequent updates.
    pub fn subscribe(
        &self,
        payment_id: &str,
    ) -> (Option<ChargeResponse>, mpsc::UnboundedReceiver<ChargeResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .entry(payment_id.to_string())
            .or_default()
            .push(tx);
        let cached = self.last_result.read().get(payment_id).cloned();
        (cached, rx)
    }

    pub fn publish(&self, payment_id: &str, result: ChargeResponse) {
        self.last_result
            .write()
            .insert(payment_id.to_string(), result.clone());

        let mut subs = self.subscribers.write();
        if let Some(list) = subs.get_mut(payment_id) {
            list.retain(|tx| tx.send(result.clone()).is_ok());
        }
    }

    pub fn cached_result(&self, payment_id: &str) -> Option<ChargeResponse> {
        self.last_result.read().get(payment_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{ChargeResultData, PaymentState};

    fn result() -> ChargeResponse {
        ChargeResponse {
            success: true,
            status: PaymentState::Success,
            payment_id: "p1".into(),
            data: ChargeResultData {
                provider: Some("mock".into()),
                latency_ms: Some(10),
                error_code: None::<ErrorCode>,
                error_message: None,
            },
        }
    }

    #[tokio::test]
    async fn subscribe_replays_cached_result() {
        let bus = NotificationBus::new();
        bus.publish("p1", result());
        let (cached, _rx) = bus.subscribe("p1");
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn publish_fans_out_to_subscribers() {
        let bus = NotificationBus::new();
        let (_, mut rx1) = bus.subscribe("p1");
        let (_, mut rx2) = bus.subscribe("p1");
        bus.publish("p1", result());
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
