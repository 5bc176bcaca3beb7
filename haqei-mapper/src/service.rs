//! Mapping service
//!
//! Public operation surface tying the pieces together:
//!
//! ```text
//! input -> cache key -> coalesce -> MultiTierCache::get_or_compute
//!                                     '-> FallbackChain::run -> MappingResult
//! ```
//!
//! **Coalescing:** at most one computation per cache key is in flight.
//! Concurrent requests for the same key await one shared future; the entry
//! is removed when that future completes.
//!
//! Built with [`MappingService::builder`]; every collaborator (stores,
//! extractor, clock, reference table) can be injected.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use haqei_common::time::{Clock, SystemClock};

use crate::cache::{CacheStats, KeyValueStore, MultiTierCache, StructuredStore};
use crate::config::{resolve_seed, MapperConfig};
use crate::determinism::{DeterminismGuarantor, DeterminismReport};
use crate::error::Result;
use crate::extractors::FeatureExtractor;
use crate::fallback::{ChainFactory, FallbackChain, FullExtractor, RankedCandidate, TierRequest};
use crate::reference::ReferenceTable;
use crate::stats::{SelectionStats, StatsSnapshot};
use crate::types::{Answer, CacheOrigin, LineId, MappingInput, MappingResult};

type InFlight = Shared<BoxFuture<'static, MappingResult>>;

/// Cheap to clone; clones share caches, statistics and in-flight work
#[derive(Clone)]
pub struct MappingService {
    inner: Arc<Inner>,
}

struct Inner {
    factory: ChainFactory,
    chain: FallbackChain,
    ranker: FullExtractor,
    cache: MultiTierCache<MappingResult>,
    clock: Arc<dyn Clock>,
    result_ttl: Duration,
    degraded_window: Duration,
    verify_repetitions: usize,
    in_flight: Mutex<HashMap<String, InFlight>>,
    stats: Mutex<SelectionStats>,
}

impl MappingService {
    pub fn builder(config: MapperConfig) -> MappingServiceBuilder {
        MappingServiceBuilder::new(config)
    }

    /// Map free text to a line state
    pub async fn map_text(&self, text: &str) -> MappingResult {
        self.map(MappingInput::Text(text.to_string())).await
    }

    /// Map ordered questionnaire answers to a line state
    pub async fn map_answers(&self, answers: &[Answer]) -> MappingResult {
        self.map(MappingInput::Answers(answers.to_vec())).await
    }

    /// Map any input; never fails, degrading through the fallback tiers
    pub async fn map(&self, input: MappingInput) -> MappingResult {
        let key = input.cache_key();

        let pending = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight computation");
                    existing.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let owned_key = key.clone();
                    let future = async move {
                        let result = inner.resolve(&input, &owned_key).await;
                        lock(&inner.in_flight).remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, future.clone());
                    future
                }
            }
        };

        let result = pending.await;
        lock(&self.inner.stats).record(&result);
        result
    }

    /// Remove a cache key from every tier
    pub async fn invalidate(&self, key: &str) {
        self.inner.cache.invalidate(key).await;
        info!(key, "Cache entry invalidated");
    }

    /// Verify that every input maps to the same line across fresh chains
    ///
    /// `repetitions` defaults to `[mapper] verify_repetitions`.
    ///
    /// # Errors
    /// `MapperError::DeterminismViolation` with every differing output, or
    /// `MapperError::Configuration` for too few repetitions.
    pub async fn verify_determinism(
        &self,
        inputs: &[MappingInput],
        repetitions: Option<usize>,
    ) -> Result<DeterminismReport> {
        DeterminismGuarantor::new(self.inner.factory.clone())
            .verify(inputs, repetitions.unwrap_or(self.inner.verify_repetitions))
            .await
    }

    /// Same as [`verify_determinism`](Self::verify_determinism) but reports
    /// divergence instead of failing
    pub async fn check_determinism(
        &self,
        inputs: &[MappingInput],
        repetitions: Option<usize>,
    ) -> Result<DeterminismReport> {
        DeterminismGuarantor::new(self.inner.factory.clone())
            .check(inputs, repetitions.unwrap_or(self.inner.verify_repetitions))
            .await
    }

    /// Full-tier ranking of the best `limit` candidates, bypassing the cache
    pub async fn rank(&self, input: &MappingInput, limit: usize) -> Result<Vec<RankedCandidate>> {
        let key = input.cache_key();
        let normalized = input.surface_text();
        self.inner
            .ranker
            .rank(
                &TierRequest {
                    input,
                    normalized_text: &normalized,
                    cache_key: &key,
                },
                limit,
            )
            .await
    }

    pub fn stats(&self) -> StatsSnapshot {
        let table = self.inner.factory.table();
        let names = |id: LineId| table.get(id).hexagram_name.clone();
        lock(&self.inner.stats).snapshot(self.inner.cache.stats(), names)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// A warm/cold failure happened within `[cache] degraded_window_secs`
    pub fn cache_degraded(&self) -> bool {
        self.inner.cache.degraded_within(self.inner.degraded_window)
    }

    pub fn table(&self) -> &Arc<ReferenceTable> {
        self.inner.factory.table()
    }

    /// Keys currently being computed
    pub fn in_flight(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }
}

impl Inner {
    async fn resolve(&self, input: &MappingInput, key: &str) -> MappingResult {
        let hit = self
            .cache
            .get_or_compute(key, self.result_ttl, || self.compute(input, key))
            .await;

        let mut result = hit.value;
        result.cache_origin = hit.origin;
        result
    }

    async fn compute(&self, input: &MappingInput, key: &str) -> MappingResult {
        let normalized = input.surface_text();
        let outcome = self
            .chain
            .run(&TierRequest {
                input,
                normalized_text: &normalized,
                cache_key: key,
            })
            .await;
        let degraded = outcome.degraded();

        let result = MappingResult {
            selected_line: outcome.selection.line,
            confidence: outcome.selection.confidence,
            source_tier: outcome.source_tier,
            cache_origin: CacheOrigin::Computed,
            timestamp_ms: self.clock.now_ms(),
            cache_key: key.to_string(),
        };

        info!(
            key,
            line = %result.line_id(),
            tier = %result.source_tier,
            confidence = result.confidence,
            degraded,
            "Mapped input"
        );
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Builder
// ============================================================================

pub struct MappingServiceBuilder {
    config: MapperConfig,
    seed: Option<String>,
    table: Option<Arc<ReferenceTable>>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
    warm: Option<Arc<dyn KeyValueStore>>,
    cold: Option<Arc<dyn StructuredStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MappingServiceBuilder {
    fn new(config: MapperConfig) -> Self {
        Self {
            config,
            seed: None,
            table: None,
            extractor: None,
            warm: None,
            cold: None,
            clock: None,
        }
    }

    /// Seed overriding `[mapper] seed`
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Use this table instead of loading `[mapper] reference_data`
    pub fn reference_table(mut self, table: Arc<ReferenceTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Feature extractor for text input in the full tier
    pub fn extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Warm store; ignored when `[cache] warm_enabled = false`
    pub fn warm_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.warm = Some(store);
        self
    }

    /// Cold store; ignored when `[cache] cold_enabled = false`
    pub fn cold_store(mut self, store: Arc<dyn StructuredStore>) -> Self {
        self.cold = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// `MapperError::Configuration` for a missing seed, invalid settings or
    /// unusable reference data.
    pub fn build(self) -> Result<MappingService> {
        let config = self.config;
        config.validate()?;

        let seed = resolve_seed(self.seed, &config)?;
        let table = match self.table {
            Some(table) => table,
            None => Arc::new(ReferenceTable::load(
                config.mapper.reference_data.as_deref(),
                &config.scoring,
            )?),
        };

        let mut factory = ChainFactory::new(
            table,
            config.scoring.clone(),
            config.fallback.clone(),
            seed,
            config.mapper.max_input_chars,
        );
        if let Some(extractor) = self.extractor {
            factory = factory.with_extractor(extractor);
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let mut cache = MultiTierCache::new(&config.cache, clock.clone());
        if let (true, Some(store)) = (config.cache.warm_enabled, self.warm) {
            cache = cache.with_warm(store, &config.cache);
        }
        if let (true, Some(store)) = (config.cache.cold_enabled, self.cold) {
            cache = cache.with_cold(store, &config.cache);
        }

        info!(
            lines = factory.table().len(),
            hot_capacity = config.cache.hot_capacity,
            warm = cache.has_warm(),
            cold = cache.has_cold(),
            "Mapping service ready"
        );

        Ok(MappingService {
            inner: Arc::new(Inner {
                chain: factory.build()?,
                ranker: factory.full_extractor()?,
                factory,
                cache,
                clock,
                result_ttl: config.mapper.result_ttl(),
                degraded_window: config.cache.degraded_window(),
                verify_repetitions: config.mapper.verify_repetitions,
                in_flight: Mutex::new(HashMap::new()),
                stats: Mutex::new(SelectionStats::default()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapperError;
    use crate::types::SourceTier;

    fn config() -> MapperConfig {
        let mut config = MapperConfig::default();
        config.mapper.seed = Some("service-test".to_string());
        config.fallback.full_budget_ms = 5_000;
        config.fallback.simplified_budget_ms = 5_000;
        config.fallback.rule_based_budget_ms = 5_000;
        config
    }

    #[tokio::test]
    async fn test_second_request_hits_hot_tier() {
        let service = MappingService::builder(config()).build().unwrap();
        let first = service.map_text("新しい挑戦を始める").await;
        let second = service.map_text("  新しい挑戦を始める ").await;

        assert_eq!(first.cache_origin, CacheOrigin::Computed);
        assert_eq!(second.cache_origin, CacheOrigin::Hot);
        assert_eq!(first.line_id(), second.line_id());
        assert_eq!(first.cache_key, "text:新しい挑戦を始める");
        assert_eq!(service.stats().total, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let service = MappingService::builder(config()).build().unwrap();
        let first = service.map_text("調和").await;
        service.invalidate(&first.cache_key).await;
        let again = service.map_text("調和").await;
        assert_eq!(again.cache_origin, CacheOrigin::Computed);
        assert_eq!(again.line_id(), first.line_id());
    }

    #[tokio::test]
    async fn test_empty_answers_still_map() {
        let service = MappingService::builder(config()).build().unwrap();
        let result = service.map_answers(&[]).await;
        assert_eq!(result.source_tier, SourceTier::RuleBased);
        assert_eq!(result.cache_key, "answers:");
        assert!(result.confidence.is_finite());
    }

    #[tokio::test]
    async fn test_missing_seed_is_configuration_error() {
        let result = MappingService::builder(MapperConfig::default()).build();
        assert!(matches!(result, Err(MapperError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_rank_top_matches_selection() {
        let service = MappingService::builder(config()).build().unwrap();
        let input = MappingInput::Text("困難に挑戦する".to_string());
        let ranked = service.rank(&input, 3).await.unwrap();
        let mapped = service.map(input).await;
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].line, mapped.line_id());
    }
}
