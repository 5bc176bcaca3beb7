//! Determinism verification harness
//!
//! Runs every input several times, each repetition through a newly built
//! [`FallbackChain`](crate::fallback::FallbackChain) with no cache in front of
//! it, and compares the selected lines. Not used on the serving path.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{MapperError, Result};
use crate::fallback::{ChainFactory, TierRequest};
use crate::types::{LineId, MappingInput};

/// Fewest repetitions that can detect divergence
pub const MIN_REPETITIONS: usize = 2;

pub const DEFAULT_REPETITIONS: usize = 3;

/// Lines produced for one input across repetitions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergentOutput {
    /// Cache key of the input
    pub input: String,
    /// Selected line per repetition, in run order
    pub outputs: Vec<LineId>,
}

/// Some input mapped to different lines across repetitions
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("Determinism violated for {} input(s)", .differing.len())]
pub struct DeterminismViolation {
    pub differing: Vec<DivergentOutput>,
}

/// Per-input pass/fail, keyed by cache key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterminismReport {
    pub repetitions: usize,
    pub results: BTreeMap<String, bool>,
    pub differing: Vec<DivergentOutput>,
}

impl DeterminismReport {
    pub fn passed(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }
}

pub struct DeterminismGuarantor {
    factory: ChainFactory,
}

impl DeterminismGuarantor {
    pub fn new(factory: ChainFactory) -> Self {
        Self { factory }
    }

    /// Run the check and fail on any divergence
    ///
    /// # Errors
    /// - `MapperError::Configuration` when `repetitions < MIN_REPETITIONS`
    /// - `MapperError::DeterminismViolation` listing every differing input
    pub async fn verify(&self, inputs: &[MappingInput], repetitions: usize) -> Result<DeterminismReport> {
        let report = self.check(inputs, repetitions).await?;
        if report.passed() {
            Ok(report)
        } else {
            Err(DeterminismViolation {
                differing: report.differing,
            }
            .into())
        }
    }

    /// Run the check and return the report without raising on divergence
    pub async fn check(&self, inputs: &[MappingInput], repetitions: usize) -> Result<DeterminismReport> {
        if repetitions < MIN_REPETITIONS {
            return Err(MapperError::Configuration(format!(
                "determinism check needs at least {} repetitions, got {}",
                MIN_REPETITIONS, repetitions
            )));
        }

        let prepared: Vec<(String, String)> = inputs
            .iter()
            .map(|input| (input.cache_key(), input.surface_text()))
            .collect();
        let mut outputs: Vec<Vec<LineId>> = vec![Vec::with_capacity(repetitions); inputs.len()];

        for _ in 0..repetitions {
            let chain = self.factory.build()?;
            for (index, input) in inputs.iter().enumerate() {
                let (key, normalized) = &prepared[index];
                let outcome = chain
                    .run(&TierRequest {
                        input,
                        normalized_text: normalized,
                        cache_key: key,
                    })
                    .await;
                outputs[index].push(outcome.selection.line.id());
            }
        }

        let mut results = BTreeMap::new();
        let mut differing = Vec::new();
        for ((key, _), lines) in prepared.into_iter().zip(outputs) {
            let stable = lines.windows(2).all(|w| w[0] == w[1]);
            if !stable {
                warn!(key = %key, outputs = ?lines, "Input mapped to different lines across runs");
                differing.push(DivergentOutput {
                    input: key.clone(),
                    outputs: lines,
                });
            }
            // Duplicate inputs share a key; one unstable run fails the key
            let entry = results.entry(key).or_insert(true);
            *entry &= stable;
        }

        info!(
            inputs = inputs.len(),
            repetitions,
            failed = differing.len(),
            "Determinism check complete"
        );

        Ok(DeterminismReport {
            repetitions,
            results,
            differing,
        })
    }
}
