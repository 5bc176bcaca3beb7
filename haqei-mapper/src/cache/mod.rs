//! Multi-tier cache
//!
//! **Tiers:**
//! - Hot: in-process LRU bounded by entry count, no TTL
//! - Warm: `KeyValueStore`, TTL and latency budget from `[cache]`
//! - Cold: `StructuredStore`, longer TTL and budget
//!
//! `get` checks hot, then warm (promoting into hot), then cold (promoting into
//! hot and warm). A hot hit returns without touching warm or cold. Entries
//! carry their absolute expiry, so a promoted entry never outlives the tier it
//! was read from.
//!
//! Warm/cold errors and budget overruns are logged as `CacheUnavailable` and
//! treated as misses; no cache failure ever reaches the caller.

pub mod cold;
pub mod hot;
pub mod warm;

pub use cold::{SqliteStructuredStore, StructuredStore};
pub use hot::HotTier;
pub use warm::{InMemoryKeyValueStore, KeyValueStore};

use haqei_common::time::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::MapperError;
use crate::types::CacheOrigin;

/// Backend failure inside a warm or cold store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A value found in (or computed for) the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub origin: CacheOrigin,
}

/// Persisted wrapper for warm and cold entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub expires_at_ms: i64,
    pub tier: CacheOrigin,
}

/// Hit/miss counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hot_hits: u64,
    pub warm_hits: u64,
    pub cold_hits: u64,
    pub misses: u64,
    /// Warm/cold operations that failed or exceeded their budget
    pub degradations: u64,
    /// Clock time of the most recent degradation
    pub last_degradation_ms: Option<i64>,
    pub hot_entries: usize,
}

/// `last_degradation_ms` before any degradation
const NEVER: i64 = i64::MIN;

#[derive(Debug)]
struct Counters {
    hot_hits: AtomicU64,
    warm_hits: AtomicU64,
    cold_hits: AtomicU64,
    misses: AtomicU64,
    degradations: AtomicU64,
    last_degradation_ms: AtomicI64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            hot_hits: AtomicU64::new(0),
            warm_hits: AtomicU64::new(0),
            cold_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            degradations: AtomicU64::new(0),
            last_degradation_ms: AtomicI64::new(NEVER),
        }
    }
}

impl Counters {
    fn record_degradation(&self, now_ms: i64) {
        self.degradations.fetch_add(1, Ordering::Relaxed);
        self.last_degradation_ms.fetch_max(now_ms, Ordering::Relaxed);
    }
}

/// Warm tier handle: store plus its TTL and budget
#[derive(Clone)]
struct WarmTier {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    budget: Duration,
}

/// Cold tier handle
#[derive(Clone)]
struct ColdTier {
    store: Arc<dyn StructuredStore>,
    ttl: Duration,
    budget: Duration,
}

/// Read-through / write-through cache over hot, warm and cold tiers
pub struct MultiTierCache<V> {
    hot: HotTier<V>,
    warm: Option<WarmTier>,
    cold: Option<ColdTier>,
    write_behind: bool,
    counters: Arc<Counters>,
    clock: Arc<dyn Clock>,
}

impl<V> MultiTierCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Hot tier only; attach stores with [`with_warm`](Self::with_warm) and
    /// [`with_cold`](Self::with_cold)
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            hot: HotTier::new(config.hot_capacity),
            warm: None,
            cold: None,
            write_behind: config.write_behind,
            counters: Arc::new(Counters::default()),
            clock,
        }
    }

    pub fn with_warm(mut self, store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        self.warm = Some(WarmTier {
            store,
            ttl: config.warm_ttl(),
            budget: config.warm_budget(),
        });
        self
    }

    pub fn with_cold(mut self, store: Arc<dyn StructuredStore>, config: &CacheConfig) -> Self {
        self.cold = Some(ColdTier {
            store,
            ttl: config.cold_ttl(),
            budget: config.cold_budget(),
        });
        self
    }

    /// Look up `key` in hot, warm, then cold
    pub async fn get(&self, key: &str) -> Option<CacheHit<V>> {
        if let Some(value) = self.hot.get(key) {
            self.counters.hot_hits.fetch_add(1, Ordering::Relaxed);
            return Some(CacheHit {
                value,
                origin: CacheOrigin::Hot,
            });
        }

        if let Some(warm) = &self.warm {
            if let Some(entry) = self.read_warm(warm, key).await {
                let value = entry.value;
                self.hot.put(key, value.clone());
                self.counters.warm_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Warm cache hit, promoted to hot");
                return Some(CacheHit {
                    value,
                    origin: CacheOrigin::Warm,
                });
            }
        }

        if let Some(cold) = &self.cold {
            if let Some(entry) = self.read_cold(cold, key).await {
                let value = entry.value;
                self.hot.put(key, value.clone());
                if let (Some(warm), Some(remaining)) =
                    (&self.warm, remaining_ttl(entry.expires_at_ms, self.clock.now_ms()))
                {
                    self.write_warm(warm, key, &value, remaining.min(warm.ttl)).await;
                }
                self.counters.cold_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cold cache hit, promoted to hot and warm");
                return Some(CacheHit {
                    value,
                    origin: CacheOrigin::Cold,
                });
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value` in every tier
    ///
    /// Hot is updated before returning. Warm and cold get TTL
    /// `min(ttl, tier_ttl)` and are awaited within their budgets, or spawned
    /// when write-behind is enabled.
    pub async fn set(&self, key: &str, value: V, ttl: Duration) {
        self.hot.put(key, value.clone());

        if self.write_behind {
            self.spawn_write_behind(key, value, ttl);
            return;
        }

        if let Some(warm) = &self.warm {
            self.write_warm(warm, key, &value, ttl.min(warm.ttl)).await;
        }
        if let Some(cold) = &self.cold {
            self.write_cold(cold, key, &value, ttl.min(cold.ttl)).await;
        }
    }

    /// Remove `key` from every tier
    pub async fn invalidate(&self, key: &str) {
        self.hot.remove(key);

        if let Some(warm) = &self.warm {
            let result = tokio::time::timeout(warm.budget, warm.store.delete(key)).await;
            self.absorb("warm", "delete", key, warm.budget, result);
        }
        if let Some(cold) = &self.cold {
            let result = tokio::time::timeout(cold.budget, cold.store.delete(key)).await;
            self.absorb("cold", "delete", key, cold.budget, result);
        }
    }

    /// Read-through: return the cached value or compute, store and return it
    pub async fn get_or_compute<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> CacheHit<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(key).await {
            return hit;
        }
        let value = compute().await;
        self.set(key, value.clone(), ttl).await;
        CacheHit {
            value,
            origin: CacheOrigin::Computed,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hot_hits: self.counters.hot_hits.load(Ordering::Relaxed),
            warm_hits: self.counters.warm_hits.load(Ordering::Relaxed),
            cold_hits: self.counters.cold_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            degradations: self.counters.degradations.load(Ordering::Relaxed),
            last_degradation_ms: self.last_degradation_ms(),
            hot_entries: self.hot.len(),
        }
    }

    /// Whether a warm/cold operation degraded less than `window` ago
    pub fn degraded_within(&self, window: Duration) -> bool {
        let Some(last) = self.last_degradation_ms() else {
            return false;
        };
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.clock.now_ms().saturating_sub(last) < window_ms
    }

    fn last_degradation_ms(&self) -> Option<i64> {
        match self.counters.last_degradation_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => Some(ms),
        }
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    pub fn has_warm(&self) -> bool {
        self.warm.is_some()
    }

    pub fn has_cold(&self) -> bool {
        self.cold.is_some()
    }

    // ------------------------------------------------------------------------
    // Tier I/O
    // ------------------------------------------------------------------------

    async fn read_warm(&self, warm: &WarmTier, key: &str) -> Option<CacheEntry<V>> {
        let result = tokio::time::timeout(warm.budget, warm.store.get(key)).await;
        let raw = self.absorb("warm", "get", key, warm.budget, result)??;
        self.decode("warm", key, &raw)
    }

    async fn read_cold(&self, cold: &ColdTier, key: &str) -> Option<CacheEntry<V>> {
        let result = tokio::time::timeout(cold.budget, cold.store.query(key)).await;
        let raw = self.absorb("cold", "query", key, cold.budget, result)??;
        self.decode("cold", key, &raw)
    }

    async fn write_warm(&self, warm: &WarmTier, key: &str, value: &V, ttl: Duration) {
        let Some(raw) = self.encode(key, value, ttl, CacheOrigin::Warm) else {
            return;
        };
        let result =
            tokio::time::timeout(warm.budget, warm.store.put(key, raw, ttl_seconds(ttl))).await;
        self.absorb("warm", "put", key, warm.budget, result);
    }

    async fn write_cold(&self, cold: &ColdTier, key: &str, value: &V, ttl: Duration) {
        let Some(raw) = self.encode(key, value, ttl, CacheOrigin::Cold) else {
            return;
        };
        let expires_at_ms = expires_at(self.clock.now_ms(), ttl);
        let result =
            tokio::time::timeout(cold.budget, cold.store.upsert(key, raw, expires_at_ms)).await;
        self.absorb("cold", "upsert", key, cold.budget, result);
    }

    fn spawn_write_behind(&self, key: &str, value: V, ttl: Duration) {
        let now = self.clock.now_ms();

        if let Some(warm) = self.warm.clone() {
            let ttl = ttl.min(warm.ttl);
            if let Some(raw) = self.encode(key, &value, ttl, CacheOrigin::Warm) {
                let key = key.to_string();
                let counters = Arc::clone(&self.counters);
                let clock = Arc::clone(&self.clock);
                tokio::spawn(async move {
                    if let Err(e) = warm.store.put(&key, raw, ttl_seconds(ttl)).await {
                        counters.record_degradation(clock.now_ms());
                        warn!(tier = "warm", key = %key, error = %e, "Write-behind failed");
                    }
                });
            }
        }

        if let Some(cold) = self.cold.clone() {
            let ttl = ttl.min(cold.ttl);
            if let Some(raw) = self.encode(key, &value, ttl, CacheOrigin::Cold) {
                let key = key.to_string();
                let counters = Arc::clone(&self.counters);
                let clock = Arc::clone(&self.clock);
                let expires_at_ms = expires_at(now, ttl);
                tokio::spawn(async move {
                    if let Err(e) = cold.store.upsert(&key, raw, expires_at_ms).await {
                        counters.record_degradation(clock.now_ms());
                        warn!(tier = "cold", key = %key, error = %e, "Write-behind failed");
                    }
                });
            }
        }
    }

    /// Convert a store result into an option, logging failures and timeouts
    fn absorb<T>(
        &self,
        tier: &'static str,
        operation: &'static str,
        key: &str,
        budget: Duration,
        result: Result<Result<T, StoreError>, tokio::time::error::Elapsed>,
    ) -> Option<T> {
        let reason = match result {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("exceeded {} ms budget", budget.as_millis()),
        };
        self.counters.record_degradation(self.clock.now_ms());
        let error = MapperError::CacheUnavailable { tier, reason };
        warn!(tier, operation, key, error = %error, "Cache tier degraded");
        None
    }

    fn encode(&self, key: &str, value: &V, ttl: Duration, tier: CacheOrigin) -> Option<String> {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            expires_at_ms: expires_at(self.clock.now_ms(), ttl),
            tier,
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => Some(raw),
            Err(e) => {
                self.counters.record_degradation(self.clock.now_ms());
                warn!(tier = %tier, key, error = %e, "Cache entry not serializable");
                None
            }
        }
    }

    fn decode(&self, tier: &'static str, key: &str, raw: &str) -> Option<CacheEntry<V>> {
        match serde_json::from_str::<CacheEntry<V>>(raw) {
            Ok(entry) if entry.key != key => {
                warn!(tier, key, stored_key = %entry.key, "Cache entry key mismatch, ignoring");
                None
            }
            Ok(entry) if entry.expires_at_ms <= self.clock.now_ms() => {
                debug!(tier, key, expires_at_ms = entry.expires_at_ms, "Cache entry expired, ignoring");
                None
            }
            Ok(entry) => Some(entry),
            Err(e) => {
                self.counters.record_degradation(self.clock.now_ms());
                let error = MapperError::CacheUnavailable {
                    tier,
                    reason: format!("undecodable entry: {}", e),
                };
                warn!(tier, key, error = %error, "Cache tier degraded");
                None
            }
        }
    }
}

/// Time left before `expires_at_ms`, `None` once it has passed
fn remaining_ttl(expires_at_ms: i64, now_ms: i64) -> Option<Duration> {
    let remaining = expires_at_ms.saturating_sub(now_ms);
    u64::try_from(remaining)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Whole seconds for `KeyValueStore::put`, rounded up so a sub-second
/// remainder is not written as an already-expired entry
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

fn expires_at(now_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(ttl_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haqei_common::time::ManualClock;

    fn config() -> CacheConfig {
        CacheConfig {
            warm_budget_ms: 1_000,
            cold_budget_ms: 1_000,
            ..Default::default()
        }
    }

    fn cache_with_warm(clock: Arc<ManualClock>) -> (MultiTierCache<u32>, Arc<InMemoryKeyValueStore>) {
        let warm = Arc::new(InMemoryKeyValueStore::new(clock.clone()));
        let cache = MultiTierCache::new(&config(), clock).with_warm(warm.clone(), &config());
        (cache, warm)
    }

    #[tokio::test]
    async fn test_set_then_get_is_hot() {
        let (cache, _) = cache_with_warm(Arc::new(ManualClock::new(0)));
        cache.set("k", 7, Duration::from_secs(60)).await;

        let hit = cache.get("k").await.unwrap();
        assert_eq!(hit, CacheHit { value: 7, origin: CacheOrigin::Hot });
        assert_eq!(cache.stats().hot_hits, 1);
    }

    #[tokio::test]
    async fn test_warm_only_entry_promotes_to_hot() {
        let clock = Arc::new(ManualClock::new(0));
        let (cache, warm) = cache_with_warm(clock);
        let entry = CacheEntry { key: "k".to_string(), value: 9u32, expires_at_ms: 60_000, tier: CacheOrigin::Warm };
        warm.put("k", serde_json::to_string(&entry).unwrap(), 60).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().origin, CacheOrigin::Warm);
        assert_eq!(cache.get("k").await.unwrap().origin, CacheOrigin::Hot);
    }

    #[tokio::test]
    async fn test_warm_ttl_capped_by_requested_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let (cache, warm) = cache_with_warm(clock.clone());
        cache.set("k", 1, Duration::from_secs(10)).await;

        clock.advance_ms(10_000);
        assert!(warm.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_tiers() {
        let (cache, warm) = cache_with_warm(Arc::new(ManualClock::new(0)));
        cache.set("k", 1, Duration::from_secs(60)).await;
        cache.invalidate("k").await;

        assert!(cache.get("k").await.is_none());
        assert!(warm.get("k").await.unwrap().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_computes_once() {
        let (cache, _) = cache_with_warm(Arc::new(ManualClock::new(0)));
        let first = cache.get_or_compute("k", Duration::from_secs(60), || async { 42 }).await;
        let second = cache.get_or_compute("k", Duration::from_secs(60), || async { 0 }).await;

        assert_eq!(first, CacheHit { value: 42, origin: CacheOrigin::Computed });
        assert_eq!(second, CacheHit { value: 42, origin: CacheOrigin::Hot });
    }

    #[tokio::test]
    async fn test_mismatched_key_is_ignored() {
        let (cache, warm) = cache_with_warm(Arc::new(ManualClock::new(0)));
        let entry = CacheEntry { key: "other".to_string(), value: 1u32, expires_at_ms: 60_000, tier: CacheOrigin::Warm };
        warm.put("k", serde_json::to_string(&entry).unwrap(), 60).await.unwrap();

        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_past_its_expiry_is_a_miss() {
        let clock = Arc::new(ManualClock::new(0));
        let (cache, warm) = cache_with_warm(clock.clone());
        let entry = CacheEntry { key: "k".to_string(), value: 3u32, expires_at_ms: 5_000, tier: CacheOrigin::Warm };
        // Store keeps it for a minute; the entry itself says five seconds
        warm.put("k", serde_json::to_string(&entry).unwrap(), 60).await.unwrap();

        clock.set_ms(5_000);
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.stats().degradations, 0);
    }

    #[test]
    fn test_remaining_ttl() {
        assert_eq!(remaining_ttl(10_000, 4_000), Some(Duration::from_secs(6)));
        assert_eq!(remaining_ttl(10_000, 10_000), None);
        assert_eq!(remaining_ttl(10_000, 12_000), None);
    }

    #[test]
    fn test_ttl_seconds_rounds_up() {
        assert_eq!(ttl_seconds(Duration::from_secs(3)), 3);
        assert_eq!(ttl_seconds(Duration::from_millis(2_500)), 3);
        assert_eq!(ttl_seconds(Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_expires_at_saturates() {
        assert_eq!(expires_at(i64::MAX - 1, Duration::from_secs(10)), i64::MAX);
        assert_eq!(expires_at(1_000, Duration::from_secs(1)), 2_000);
    }
}
