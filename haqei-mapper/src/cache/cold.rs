//! Cold tier: durable structured store
//!
//! `SqliteStructuredStore` keeps serialized values in the `mapping_cache`
//! table created by `haqei_common::db`. Expired rows are invisible to
//! `query` and removed by `purge_expired`.

use haqei_common::time::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use super::StoreError;

/// Durable store addressed by key, with absolute expiry (Unix ms)
#[async_trait::async_trait]
pub trait StructuredStore: Send + Sync {
    async fn query(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn upsert(&self, key: &str, value: String, expires_at_ms: i64) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// SQLite-backed cold store
#[derive(Debug, Clone)]
pub struct SqliteStructuredStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStructuredStore {
    /// Pool must already carry the `mapping_cache` table
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Delete expired rows; returns how many were removed
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM mapping_cache WHERE expires_at_ms <= ?")
            .bind(self.clock.now_ms())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "Purged expired cold cache rows");
        }
        Ok(removed)
    }

    /// Number of rows, expired or not
    pub async fn row_count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mapping_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl StructuredStore for SqliteStructuredStore {
    async fn query(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM mapping_cache WHERE key = ? AND expires_at_ms > ?",
        )
        .bind(key)
        .bind(self.clock.now_ms())
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn upsert(&self, key: &str, value: String, expires_at_ms: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mapping_cache (key, value, expires_at_ms, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at_ms = excluded.expires_at_ms,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM mapping_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
