//! Key-value store abstraction backing intents, result cache and the
//! provider-affinity map.
//!
//! The in-memory implementation exists so the mesh is runnable and
//! testable without a live Redis instance.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
pub struct InMemoryKvStore {
    data: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut guard = self.data.lock();
        if let Some(entry) = guard.get(key) {
            if entry.expires_at.map(|t| Instant::now() >= t).unwrap_or(false) {
                guard.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}

/// `redis`-backed store, used when `REDIS_URL` is configured.
pub struct RedisKvStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let v: Option<String> = conn.get(key).await?;
        Ok(v)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        match ttl {
            Some(d) => {
                let _: () = conn.set_ex(key, value, d.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let kv = InMemoryKvStore::new();
        kv.set("a", "1", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let kv = InMemoryKvStore::new();
        kv.set("a", "1", Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let kv = InMemoryKvStore::new();
        assert!(!kv.delete("missing").await.unwrap());
        kv.set("a", "1", None).await.unwrap();
        assert!(kv.delete("a").await.unwrap());
    }
}
