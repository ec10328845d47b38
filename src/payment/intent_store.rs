//! Idempotent mapping from a (caller_id, amount) fingerprint to an
//! opaque payment id.
//!
//! The fingerprint is a SHA-256 digest of the caller id and amount,
//! hex-encoded.

use crate::error::{AppError, AppResult, ErrorCode};
use crate::kv::KvStore;
use sha2::{Digest, Sha256};

pub struct IntentStore<'a> {
    kv: &'a dyn KvStore,
}

fn fingerprint(caller_id: &str, amount: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(caller_id.as_bytes());
    hasher.update(b"|");
    hasher.update(amount.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

impl<'a> IntentStore<'a> {
    pub fn new(kv: &'a dyn KvStore) -> Self {
        Self { kv }
    }

    fn key(caller_id: &str, amount: i64) -> String {
        format!("intent:{}", fingerprint(caller_id, amount))
    }

    pub async fn register(&self, caller_id: &str, amount: i64) -> AppResult<String> {
        let key = Self::key(caller_id, amount);
        if let Some(existing) = self
            .kv
            .get(&key)
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?
        {
            return Ok(existing);
        }
        let payment_id = format!("pay_{}", uuid::Uuid::new_v4());
        self.kv
            .set(&key, &payment_id, None)
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?;
        Ok(payment_id)
    }

    pub async fn revoke(&self, caller_id: &str, amount: i64) -> AppResult<()> {
        let key = Self::key(caller_id, amount);
        let removed = self
            .kv
            .delete(&key)
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?;
        if !removed {
            return Err(AppError::new(ErrorCode::PaymentKeyNotFound, "no intent for this id/amount"));
        }
        Ok(())
    }

    /// Verifies a caller-supplied payment id actually corresponds to the
    /// (caller_id, amount) pair it is being used with.
    pub async fn verify(&self, caller_id: &str, amount: i64, payment_id: &str) -> AppResult<()> {
        let key = Self::key(caller_id, amount);
        let stored = self
            .kv
            .get(&key)
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?;
        match stored {
            Some(id) if id == payment_id => Ok(()),
            Some(_) => Err(AppError::new(ErrorCode::PaymentIdMismatch, "payment id does not match intent")),
            None => Err(AppError::new(ErrorCode::PaymentIdRequired, "no intent registered for this id/amount")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    #[tokio::test]
    async fn register_is_idempotent() {
        let kv = InMemoryKvStore::new();
        let store = IntentStore::new(&kv);
        let a = store.register("caller-1", 500).await.unwrap();
        let b = store.register("caller-1", 500).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_amount_yields_different_id() {
        let kv = InMemoryKvStore::new();
        let store = IntentStore::new(&kv);
        let a = store.register("caller-1", 500).await.unwrap();
        let b = store.register("caller-1", 600).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn verify_detects_mismatch() {
        let kv = InMemoryKvStore::new();
        let store = IntentStore::new(&kv);
        let id = store.register("caller-1", 500).await.unwrap();
        assert!(store.verify("caller-1", 500, &id).await.is_ok());
        assert!(store.verify("caller-1", 500, "wrong-id").await.is_err());
    }
}
