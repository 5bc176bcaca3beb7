//! Simplified tier: keyword substring matching only
//!
//! No extractor, no positional weights, no noise. Each line scores
//! `keyword_multiplier x (number of its keywords found in the text)`.
//! Confidence is the score-gap confidence scaled down by
//! [`CONFIDENCE_SCALE`].

use std::sync::Arc;
use std::time::Duration;

use super::{TierRequest, TierSelection, TierStrategy};
use crate::error::{MapperError, ScoringError};
use crate::mapper::confidence;
use crate::reference::ReferenceTable;
use crate::types::{LineState, SourceTier};

/// Discount applied to simplified-tier confidence
pub const CONFIDENCE_SCALE: f64 = 0.7;

pub struct SimplifiedExtractor {
    table: Arc<ReferenceTable>,
    /// Lowercased keyword sets, parallel to `table.lines()`
    keywords: Vec<Vec<String>>,
    budget: Duration,
}

impl SimplifiedExtractor {
    pub fn new(table: Arc<ReferenceTable>, budget: Duration) -> Self {
        let keywords = table
            .lines()
            .iter()
            .map(|line| {
                line.keyword_set
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| k.to_lowercase())
                    .collect()
            })
            .collect();
        Self {
            table,
            keywords,
            budget,
        }
    }

    /// Best line by keyword substring count
    pub fn select(&self, normalized_text: &str) -> Result<(&LineState, f64), ScoringError> {
        if self.table.is_empty() {
            return Err(ScoringError::EmptyReferenceTable);
        }

        let mut best: Option<(usize, f64)> = None;
        let mut runner_up = 0.0_f64;

        for (index, (line, keywords)) in self.table.lines().iter().zip(&self.keywords).enumerate() {
            let matches = keywords
                .iter()
                .filter(|k| normalized_text.contains(k.as_str()))
                .count();
            let score = line.keyword_multiplier * matches as f64;

            match best {
                Some((_, top)) if score <= top => runner_up = runner_up.max(score),
                _ => {
                    if let Some((_, top)) = best {
                        runner_up = runner_up.max(top);
                    }
                    best = Some((index, score));
                }
            }
        }

        match best {
            Some((index, top)) if top > 0.0 => {
                let line = &self.table.lines()[index];
                Ok((line, confidence(top, runner_up) * CONFIDENCE_SCALE))
            }
            _ => Err(ScoringError::NoKeywordMatch),
        }
    }
}

#[async_trait::async_trait]
impl TierStrategy for SimplifiedExtractor {
    fn tier(&self) -> SourceTier {
        SourceTier::Simplified
    }

    fn budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, request: &TierRequest<'_>) -> Result<TierSelection, MapperError> {
        let (line, confidence) = self.select(request.normalized_text)?;
        Ok(TierSelection {
            line: line.clone(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::types::LineId;

    fn simplified() -> SimplifiedExtractor {
        let table = ReferenceTable::builtin(&ScoringConfig::default()).unwrap();
        SimplifiedExtractor::new(Arc::new(table), Duration::from_millis(10))
    }

    #[test]
    fn test_no_match_is_error() {
        assert_eq!(simplified().select("").unwrap_err(), ScoringError::NoKeywordMatch);
        assert_eq!(
            simplified().select("zzz qqq").unwrap_err(),
            ScoringError::NoKeywordMatch
        );
    }

    #[test]
    fn test_most_matches_wins() {
        // 危険 深淵 洞察 are the themes of 坎為水 (29); 水 is its trigram
        let tier = simplified();
        let (line, confidence) = tier.select("危険な深淵で洞察する 水").unwrap();
        assert_eq!(line.hexagram_id, 29);
        assert!(confidence > 0.0 && confidence <= CONFIDENCE_SCALE);
    }

    #[test]
    fn test_tie_goes_to_lowest_line() {
        // 始動 is a keyword of every position-1 line
        let tier = simplified();
        let (line, confidence) = tier.select("始動").unwrap();
        assert_eq!(line.id(), LineId::new(1, 1).unwrap());
        assert_eq!(confidence, 0.0);
    }
}
