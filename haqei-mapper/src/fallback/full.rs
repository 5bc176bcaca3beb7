//! Full tier: feature extraction plus complete scoring

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{TierRequest, TierSelection, TierStrategy};
use crate::error::{MapperError, Result};
use crate::extractors::{detect_position_hint, AnswerAggregator, FeatureExtractor};
use crate::mapper::{ScoringRequest, SymbolSpaceMapper};
use crate::random::SeededRandomSource;
use crate::types::{Features, LineId, MappingInput, SourceTier};

/// One entry of a ranked diagnostic listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub line: LineId,
    pub hexagram_name: String,
    pub score: f64,
    pub contributing_features: BTreeMap<String, f64>,
}

/// Extraction + `SymbolSpaceMapper` with per-request seeded noise
pub struct FullExtractor {
    extractor: Arc<dyn FeatureExtractor>,
    aggregator: Arc<dyn AnswerAggregator>,
    mapper: SymbolSpaceMapper,
    seed: String,
    budget: Duration,
}

impl FullExtractor {
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        aggregator: Arc<dyn AnswerAggregator>,
        mapper: SymbolSpaceMapper,
        seed: impl Into<String>,
        budget: Duration,
    ) -> Self {
        Self {
            extractor,
            aggregator,
            mapper,
            seed: seed.into(),
            budget,
        }
    }

    async fn features(&self, input: &MappingInput) -> Result<Features> {
        let features = match input {
            MappingInput::Text(text) => self.extractor.extract(text).await?,
            MappingInput::Answers(answers) => self.aggregator.aggregate(answers)?,
        };
        Ok(features)
    }

    /// Noise source for one request, derived from the seed and cache key
    fn random_source(&self, request: &TierRequest<'_>) -> Result<SeededRandomSource> {
        SeededRandomSource::derive(&self.seed, request.cache_key)
    }

    /// Top `limit` candidates for diagnostics, using the same noise as `attempt`
    pub async fn rank(&self, request: &TierRequest<'_>, limit: usize) -> Result<Vec<RankedCandidate>> {
        let features = self.features(request.input).await?;
        let mut rng = self.random_source(request)?;
        let scoring = ScoringRequest {
            features: &features,
            normalized_text: request.normalized_text,
            position_hint: detect_position_hint(request.normalized_text),
        };

        let ranked = self.mapper.score_all(scoring, &mut rng)?;
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|c| RankedCandidate {
                line: c.line_state.id(),
                hexagram_name: c.line_state.hexagram_name.clone(),
                score: c.score,
                contributing_features: c.contributing_features,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl TierStrategy for FullExtractor {
    fn tier(&self) -> SourceTier {
        SourceTier::Full
    }

    fn budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, request: &TierRequest<'_>) -> std::result::Result<TierSelection, MapperError> {
        let features = self.features(request.input).await?;

        // Cancellation point between extraction and scoring
        tokio::task::yield_now().await;

        let mut rng = self.random_source(request)?;
        let scoring = ScoringRequest {
            features: &features,
            normalized_text: request.normalized_text,
            position_hint: detect_position_hint(request.normalized_text),
        };
        let selection = self.mapper.select(scoring, &mut rng)?;

        Ok(TierSelection {
            line: selection.candidate.line_state.clone(),
            confidence: selection.confidence,
        })
    }
}
