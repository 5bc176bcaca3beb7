//! Symbol space mapper
//!
//! Scores every line state against the extracted features and selects the
//! best one.
//!
//! **Per line state, in canonical order:**
//! 1. base = `position_weight`
//! 2. + `exploration_noise * rng.next()` (exactly one draw per line state)
//! 3. + `keyword_multiplier * weight` for each keyword present in the features
//! 4. x `(1 + canonical_bonus)` when the text contains a canonical phrase
//! 5. + `position_hint_bonus` when the line sits at the hinted position
//!
//! The maximum wins; exact ties go to the lowest `(hexagram_id, line_position)`.
//! Confidence is the top-to-runner-up gap relative to the top score.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::random::SeededRandomSource;
use crate::reference::ReferenceTable;
use crate::types::{Features, LineState, ScoredCandidate};

/// Inputs to one scoring pass
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub features: &'a Features,
    /// Normalized input text, for canonical phrase matching
    pub normalized_text: &'a str,
    /// Implied line position (1-6)
    pub position_hint: Option<u8>,
}

/// Selected candidate with its confidence
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub candidate: ScoredCandidate<'a>,
    pub confidence: f64,
}

/// Deterministic scoring engine over the reference table
#[derive(Debug, Clone)]
pub struct SymbolSpaceMapper {
    table: Arc<ReferenceTable>,
    canonical_bonus: f64,
    position_hint_bonus: f64,
}

impl SymbolSpaceMapper {
    pub fn new(table: Arc<ReferenceTable>, scoring: &ScoringConfig) -> Self {
        Self {
            table,
            canonical_bonus: scoring.canonical_bonus,
            position_hint_bonus: scoring.position_hint_bonus,
        }
    }

    pub fn table(&self) -> &Arc<ReferenceTable> {
        &self.table
    }

    /// Score all line states and return the arg-max
    ///
    /// # Errors
    /// `ScoringError` when the table is empty or a score is not finite.
    pub fn select(
        &self,
        request: ScoringRequest<'_>,
        rng: &mut SeededRandomSource,
    ) -> Result<Selection<'_>, ScoringError> {
        let mut best: Option<ScoredCandidate<'_>> = None;
        let mut runner_up = f64::NEG_INFINITY;

        for line in self.table.lines() {
            let candidate = self.score_line(line, request, rng)?;
            match &best {
                Some(current) if candidate.score <= current.score => {
                    runner_up = runner_up.max(candidate.score);
                }
                _ => {
                    if let Some(previous) = best.take() {
                        runner_up = runner_up.max(previous.score);
                    }
                    best = Some(candidate);
                }
            }
        }

        let candidate = best.ok_or(ScoringError::EmptyReferenceTable)?;
        let confidence = confidence(candidate.score, runner_up);
        Ok(Selection {
            candidate,
            confidence,
        })
    }

    /// Score all line states, best first
    ///
    /// Consumes the same draws as [`select`](Self::select), so the first
    /// element is the line `select` would pick for the same source.
    pub fn score_all(
        &self,
        request: ScoringRequest<'_>,
        rng: &mut SeededRandomSource,
    ) -> Result<Vec<ScoredCandidate<'_>>, ScoringError> {
        if self.table.is_empty() {
            return Err(ScoringError::EmptyReferenceTable);
        }

        let mut candidates = self
            .table
            .lines()
            .iter()
            .map(|line| self.score_line(line, request, rng))
            .collect::<Result<Vec<_>, _>>()?;

        // Stable sort keeps canonical order among equal scores
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(candidates)
    }

    fn score_line<'t>(
        &'t self,
        line: &'t LineState,
        request: ScoringRequest<'_>,
        rng: &mut SeededRandomSource,
    ) -> Result<ScoredCandidate<'t>, ScoringError> {
        let mut score = line.position_weight;

        // Drawn unconditionally so the sequence never depends on the input
        score += line.exploration_noise * rng.next();

        let mut contributing_features = BTreeMap::new();
        for keyword in &line.keyword_set {
            if let Some(weight) = request.features.get(keyword) {
                let contribution = line.keyword_multiplier * weight;
                score += contribution;
                contributing_features.insert(keyword.clone(), contribution);
            }
        }

        if !request.normalized_text.is_empty()
            && line
                .canonical_phrases
                .iter()
                .any(|phrase| request.normalized_text.contains(&phrase.to_lowercase()))
        {
            score *= 1.0 + self.canonical_bonus;
        }

        if request.position_hint == Some(line.line_position) {
            score += self.position_hint_bonus;
        }

        if !score.is_finite() {
            return Err(ScoringError::NonFiniteScore(line.id()));
        }

        Ok(ScoredCandidate {
            line_state: line,
            score,
            contributing_features,
        })
    }
}

/// `(top - runner_up) / |top|` clamped to [0, 1]; 0 when undefined
pub fn confidence(top: f64, runner_up: f64) -> f64 {
    if !top.is_finite() || top == 0.0 {
        return 0.0;
    }
    if !runner_up.is_finite() {
        return 1.0;
    }
    ((top - runner_up) / top.abs()).clamp(0.0, 1.0)
}
