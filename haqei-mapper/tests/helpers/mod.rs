//! Shared fixtures for haqei-mapper integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use haqei_mapper::cache::{KeyValueStore, StoreError, StructuredStore};
use haqei_mapper::config::{MapperConfig, ScoringConfig};
use haqei_mapper::error::ExtractionFailure;
use haqei_mapper::extractors::FeatureExtractor;
use haqei_mapper::reference::ReferenceTable;
use haqei_mapper::types::{Features, LineId, LineState, LINE_STATE_COUNT};
use haqei_mapper::MappingService;

pub const TEST_SEED: &str = "integration-seed";

/// Default config with a seed and budgets too large to trip on a slow machine
pub fn test_config() -> MapperConfig {
    let mut config = MapperConfig::default();
    config.mapper.seed = Some(TEST_SEED.to_string());
    config.fallback.full_budget_ms = 5_000;
    config.fallback.simplified_budget_ms = 5_000;
    config.fallback.rule_based_budget_ms = 5_000;
    config.cache.warm_budget_ms = 1_000;
    config.cache.cold_budget_ms = 1_000;
    config
}

pub fn test_service() -> MappingService {
    MappingService::builder(test_config())
        .build()
        .expect("service builds")
}

pub fn builtin_table() -> ReferenceTable {
    ReferenceTable::builtin(&ScoringConfig::default()).expect("builtin table")
}

/// 384 identical lines: same weight, no noise, one private keyword each
pub fn flat_table(weight: f64) -> ReferenceTable {
    let lines = (0..LINE_STATE_COUNT)
        .map(|index| {
            let id = LineId::from_index(index).expect("index in range");
            LineState {
                hexagram_id: id.hexagram_id,
                line_position: id.line_position,
                hexagram_name: format!("h{}", id.hexagram_id),
                position_weight: weight,
                exploration_noise: 0.0,
                keyword_set: vec![format!("<kw-{}>", index)],
                keyword_multiplier: 0.08,
                canonical_phrases: vec![],
            }
        })
        .collect();
    ReferenceTable::from_lines(lines).expect("flat table")
}

// ============================================================================
// Misbehaving collaborators
// ============================================================================

/// Extractor that always fails
pub struct FailingExtractor;

#[async_trait::async_trait]
impl FeatureExtractor for FailingExtractor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extract(&self, _text: &str) -> Result<Features, ExtractionFailure> {
        Err(ExtractionFailure::Unavailable("extractor offline".to_string()))
    }
}

/// Extractor that never finishes within any reasonable budget
pub struct StallingExtractor;

#[async_trait::async_trait]
impl FeatureExtractor for StallingExtractor {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn extract(&self, _text: &str) -> Result<Features, ExtractionFailure> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Features::new())
    }
}

/// Extractor whose answer flips between two keywords on every call
#[derive(Default)]
pub struct AlternatingExtractor {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl FeatureExtractor for AlternatingExtractor {
    fn name(&self) -> &'static str {
        "alternating"
    }

    async fn extract(&self, _text: &str) -> Result<Features, ExtractionFailure> {
        let keyword = if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            "家族"
        } else {
            "危険"
        };
        Ok(Features::from([(keyword.to_string(), 1.0)]))
    }
}

/// Warm and cold store whose every call fails
pub struct UnreachableStore;

#[async_trait::async_trait]
impl KeyValueStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unreachable("connection refused".to_string()))
    }

    async fn put(&self, _key: &str, _value: String, _ttl_seconds: u64) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("connection refused".to_string()))
    }
}

#[async_trait::async_trait]
impl StructuredStore for UnreachableStore {
    async fn query(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unreachable("database offline".to_string()))
    }

    async fn upsert(&self, _key: &str, _value: String, _expires_at_ms: i64) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("database offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unreachable("database offline".to_string()))
    }
}

/// Store that answers every call after `delay`
pub struct SlowStore {
    pub delay: Duration,
}

#[async_trait::async_trait]
impl KeyValueStore for SlowStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: String, _ttl_seconds: u64) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
