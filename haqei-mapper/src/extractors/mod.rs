//! Feature extraction
//!
//! Turns raw input into weighted features for the scoring engine. The
//! extractor and the answer aggregator are collaborators behind traits so a
//! morphological analyzer can replace the default lexicon without touching
//! the mapper.

pub mod answers;
pub mod lexicon;

pub use answers::LexiconAnswerAggregator;
pub use lexicon::LexiconExtractor;

use crate::error::ExtractionFailure;
use crate::reference::builtin::POSITION_CUES;
use crate::types::{Answer, Features};

/// Turns text into weighted features
///
/// Allowed to fail; failures degrade the request to a cheaper fallback tier.
#[async_trait::async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Extractor name for logs
    fn name(&self) -> &'static str;

    /// Extract features from raw (not yet normalized) text
    ///
    /// # Errors
    /// Returns `ExtractionFailure` when the input cannot be analyzed
    async fn extract(&self, text: &str) -> Result<Features, ExtractionFailure>;
}

/// Reduces ordered questionnaire answers to one feature mapping
pub trait AnswerAggregator: Send + Sync {
    fn aggregate(&self, answers: &[Answer]) -> Result<Features, ExtractionFailure>;
}

/// Line position implied by the wording of the input, if any
///
/// Counts cue words per position; the position with the most matches wins,
/// the lower position on equal counts.
pub fn detect_position_hint(normalized_text: &str) -> Option<u8> {
    let mut best: Option<(u8, usize)> = None;
    for (index, cues) in POSITION_CUES.iter().enumerate() {
        let matches = cues.iter().filter(|cue| normalized_text.contains(*cue)).count();
        if matches > 0 && best.map_or(true, |(_, n)| matches > n) {
            best = Some((index as u8 + 1, matches));
        }
    }
    best.map(|(position, _)| position)
}
