//! Warm tier: external key-value store
//!
//! The tier talks to any `KeyValueStore`. `InMemoryKeyValueStore` is the
//! in-process stand-in used when no networked store is configured; it honours
//! TTLs against the injected clock.

use haqei_common::time::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::StoreError;

/// Key-value service addressed by string keys, with per-entry TTL
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at_ms: i64,
}

/// TTL-aware in-memory key-value store
#[derive(Debug)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKeyValueStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Drop expired entries; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at_ms > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_ms();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|stored| stored.expires_at_ms > now)
            .map(|stored| stored.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), StoreError> {
        let ttl_ms = i64::try_from(ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at_ms = self.clock.now_ms().saturating_add(ttl_ms);
        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
