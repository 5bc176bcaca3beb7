//! Questionnaire answer aggregation
//!
//! Each answer value is run through the lexicon; weights of a feature seen in
//! several answers are summed, so repeated themes across a questionnaire
//! count for more than a single mention.

use std::sync::Arc;

use super::{AnswerAggregator, LexiconExtractor};
use crate::error::ExtractionFailure;
use crate::types::{Answer, Features};

/// Default `AnswerAggregator` backed by the lexicon extractor
#[derive(Debug, Clone)]
pub struct LexiconAnswerAggregator {
    lexicon: Arc<LexiconExtractor>,
}

impl LexiconAnswerAggregator {
    pub fn new(lexicon: Arc<LexiconExtractor>) -> Self {
        Self { lexicon }
    }
}

impl AnswerAggregator for LexiconAnswerAggregator {
    fn aggregate(&self, answers: &[Answer]) -> Result<Features, ExtractionFailure> {
        if answers.is_empty() {
            return Err(ExtractionFailure::EmptyAnswers);
        }

        let mut features = Features::new();
        for answer in answers {
            for (token, weight) in self.lexicon.features_of(&answer.value) {
                *features.entry(token).or_insert(0.0) += weight;
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::reference::ReferenceTable;

    fn aggregator() -> LexiconAnswerAggregator {
        let table = ReferenceTable::builtin(&ScoringConfig::default()).unwrap();
        LexiconAnswerAggregator::new(Arc::new(LexiconExtractor::from_table(&table, 2000).unwrap()))
    }

    #[test]
    fn test_empty_answers_rejected() {
        assert_eq!(aggregator().aggregate(&[]), Err(ExtractionFailure::EmptyAnswers));
    }

    #[test]
    fn test_repeated_feature_weights_sum() {
        let answers = vec![Answer::new("q1", "協力したい"), Answer::new("q2", "協力が大事")];
        let features = aggregator().aggregate(&answers).unwrap();
        assert_eq!(features.get("協力"), Some(&2.0));
    }

    #[test]
    fn test_question_ids_are_not_features() {
        let answers = vec![Answer::new("leadership", "静かに過ごす")];
        let features = aggregator().aggregate(&answers).unwrap();
        assert!(!features.contains_key("leadership"));
    }
}
