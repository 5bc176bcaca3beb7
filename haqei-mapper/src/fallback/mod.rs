//! Fallback chain
//!
//! Runs the three extraction tiers in strict order, each under its own time
//! budget, until one produces a selection:
//!
//! ```text
//! full --(error | timeout)--> simplified --(error | timeout)--> rule-based
//! ```
//!
//! The rule-based tier is terminal. If it too fails or overruns, the chain
//! returns the rule-based default (hexagram 1, line 1), so [`FallbackChain::run`]
//! always yields a result. Every degradation is logged with the tier and
//! reason.
//!
//! Budgets are enforced with `tokio::time::timeout`, which can only cancel a
//! tier at an await point. Tiers doing long synchronous work overrun their
//! budget by that amount.

pub mod full;
pub mod rule_based;
pub mod simplified;

pub use full::{FullExtractor, RankedCandidate};
pub use rule_based::RuleBasedExtractor;
pub use simplified::SimplifiedExtractor;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{FallbackConfig, ScoringConfig};
use crate::error::{MapperError, Result};
use crate::extractors::{AnswerAggregator, FeatureExtractor, LexiconAnswerAggregator, LexiconExtractor};
use crate::mapper::SymbolSpaceMapper;
use crate::reference::ReferenceTable;
use crate::types::{LineState, MappingInput, SourceTier};

// ============================================================================
// Tier contract
// ============================================================================

/// Everything a tier needs to know about one request
#[derive(Debug, Clone, Copy)]
pub struct TierRequest<'a> {
    pub input: &'a MappingInput,
    /// `input.surface_text()`, computed once per request
    pub normalized_text: &'a str,
    /// Scope for the per-request random source
    pub cache_key: &'a str,
}

/// Line chosen by a tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierSelection {
    pub line: LineState,
    pub confidence: f64,
}

/// One extraction strategy in the chain
#[async_trait::async_trait]
pub trait TierStrategy: Send + Sync {
    fn tier(&self) -> SourceTier;

    /// Wall-clock budget for one attempt
    fn budget(&self) -> Duration;

    async fn attempt(&self, request: &TierRequest<'_>) -> std::result::Result<TierSelection, MapperError>;
}

// ============================================================================
// Outcome
// ============================================================================

/// How a single tier attempt ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Selected,
    Failed { reason: String },
    TimedOut { budget_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    pub tier: SourceTier,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Result of running the chain
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub selection: TierSelection,
    /// Tier that produced `selection`
    pub source_tier: SourceTier,
    /// Attempts in the order they ran
    pub attempts: Vec<TierAttempt>,
}

impl FallbackOutcome {
    /// Whether any tier before the producing one failed or timed out
    pub fn degraded(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome != AttemptOutcome::Selected)
    }
}

// ============================================================================
// Chain
// ============================================================================

pub struct FallbackChain {
    full: Box<dyn TierStrategy>,
    simplified: Box<dyn TierStrategy>,
    rule_based: RuleBasedExtractor,
}

impl FallbackChain {
    pub fn new(
        full: Box<dyn TierStrategy>,
        simplified: Box<dyn TierStrategy>,
        rule_based: RuleBasedExtractor,
    ) -> Self {
        Self {
            full,
            simplified,
            rule_based,
        }
    }

    /// Run tiers in order until one selects a line
    pub async fn run(&self, request: &TierRequest<'_>) -> FallbackOutcome {
        let mut attempts = Vec::with_capacity(3);

        for strategy in [self.full.as_ref(), self.simplified.as_ref()] {
            match attempt_within_budget(strategy, request).await {
                Ok(selection) => {
                    attempts.push(TierAttempt {
                        tier: strategy.tier(),
                        outcome: AttemptOutcome::Selected,
                    });
                    return FallbackOutcome {
                        selection,
                        source_tier: strategy.tier(),
                        attempts,
                    };
                }
                Err(outcome) => {
                    log_degradation(strategy.tier(), &outcome, request.cache_key);
                    attempts.push(TierAttempt {
                        tier: strategy.tier(),
                        outcome,
                    });
                }
            }
        }

        let selection = match attempt_within_budget(&self.rule_based, request).await {
            Ok(selection) => {
                attempts.push(TierAttempt {
                    tier: SourceTier::RuleBased,
                    outcome: AttemptOutcome::Selected,
                });
                selection
            }
            Err(outcome) => {
                log_degradation(SourceTier::RuleBased, &outcome, request.cache_key);
                attempts.push(TierAttempt {
                    tier: SourceTier::RuleBased,
                    outcome,
                });
                self.rule_based.default_selection()
            }
        };

        FallbackOutcome {
            selection,
            source_tier: SourceTier::RuleBased,
            attempts,
        }
    }
}

async fn attempt_within_budget(
    strategy: &dyn TierStrategy,
    request: &TierRequest<'_>,
) -> std::result::Result<TierSelection, AttemptOutcome> {
    let budget = strategy.budget();
    match tokio::time::timeout(budget, strategy.attempt(request)).await {
        Ok(Ok(selection)) => {
            debug!(
                tier = %strategy.tier(),
                line = %selection.line.id(),
                confidence = selection.confidence,
                "Tier selected line"
            );
            Ok(selection)
        }
        Ok(Err(e)) => Err(AttemptOutcome::Failed {
            reason: e.to_string(),
        }),
        Err(_) => Err(AttemptOutcome::TimedOut {
            budget_ms: budget.as_millis() as u64,
        }),
    }
}

fn log_degradation(tier: SourceTier, outcome: &AttemptOutcome, key: &str) {
    match outcome {
        AttemptOutcome::Failed { reason } => {
            warn!(tier = %tier, key, reason = %reason, "Extraction tier failed, degrading")
        }
        AttemptOutcome::TimedOut { budget_ms } => {
            warn!(tier = %tier, key, budget_ms, "Extraction tier timed out, degrading")
        }
        AttemptOutcome::Selected => {}
    }
}

// ============================================================================
// Chain factory
// ============================================================================

/// Builds independent [`FallbackChain`]s over one reference table
///
/// Chains built by one factory share only the immutable table, so two chains
/// given the same input produce the same line.
#[derive(Clone)]
pub struct ChainFactory {
    table: Arc<ReferenceTable>,
    scoring: ScoringConfig,
    budgets: FallbackConfig,
    seed: String,
    max_input_chars: usize,
    /// Replaces the per-chain lexicon extractor for text input
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl ChainFactory {
    pub fn new(
        table: Arc<ReferenceTable>,
        scoring: ScoringConfig,
        budgets: FallbackConfig,
        seed: impl Into<String>,
        max_input_chars: usize,
    ) -> Self {
        Self {
            table,
            scoring,
            budgets,
            seed: seed.into(),
            max_input_chars,
            extractor: None,
        }
    }

    /// Use `extractor` for text input in the full tier
    pub fn with_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn table(&self) -> &Arc<ReferenceTable> {
        &self.table
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Full tier on its own, for ranking diagnostics
    pub fn full_extractor(&self) -> Result<FullExtractor> {
        let lexicon = Arc::new(LexiconExtractor::from_table(&self.table, self.max_input_chars)?);
        let aggregator: Arc<dyn AnswerAggregator> =
            Arc::new(LexiconAnswerAggregator::new(lexicon.clone()));
        let extractor: Arc<dyn FeatureExtractor> = match &self.extractor {
            Some(shared) => shared.clone(),
            None => lexicon,
        };

        Ok(FullExtractor::new(
            extractor,
            aggregator,
            SymbolSpaceMapper::new(self.table.clone(), &self.scoring),
            self.seed.clone(),
            self.budgets.full_budget(),
        ))
    }

    /// A new chain: fresh extractor, mapper and tier state
    pub fn build(&self) -> Result<FallbackChain> {
        Ok(FallbackChain::new(
            Box::new(self.full_extractor()?),
            Box::new(SimplifiedExtractor::new(
                self.table.clone(),
                self.budgets.simplified_budget(),
            )),
            RuleBasedExtractor::new(self.table.clone(), self.budgets.rule_based_budget()),
        ))
    }
}
