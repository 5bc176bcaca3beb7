//! Lexicon-based feature extractor
//!
//! Default `FeatureExtractor`. Two passes over the normalized text:
//! 1. Every reference keyword or canonical phrase that occurs as a substring
//! 2. Script-run tokens (kanji, hiragana, katakana, digits, latin) minus stopwords
//!
//! A feature's weight comes from the significance dictionary (1.0 otherwise);
//! a feature found by both passes keeps the larger weight.

use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::FeatureExtractor;
use crate::error::{ExtractionFailure, MapperError, Result};
use crate::reference::builtin::{DICTIONARY_WEIGHTS, STOPWORDS};
use crate::reference::ReferenceTable;
use crate::types::{normalize_text, Features};

const TOKEN_PATTERN: &str = r"[一-龠々]+|[ぁ-ん]+|[ァ-ヴー]+|[0-9０-９]+|[a-z]+";

const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone)]
struct LexiconTerm {
    /// Feature name, as spelled in the reference data
    surface: String,
    /// Lowercased form matched against normalized text
    needle: String,
    weight: f64,
}

/// Extracts features by lexicon lookup and script-run tokenization
#[derive(Debug, Clone)]
pub struct LexiconExtractor {
    terms: Vec<LexiconTerm>,
    weights: HashMap<&'static str, f64>,
    stopwords: HashSet<&'static str>,
    token_pattern: Regex,
    max_input_chars: usize,
}

impl LexiconExtractor {
    /// Build the lexicon from every keyword and phrase in the reference table
    pub fn from_table(table: &ReferenceTable, max_input_chars: usize) -> Result<Self> {
        let token_pattern = Regex::new(TOKEN_PATTERN)
            .map_err(|e| MapperError::Configuration(format!("token pattern: {}", e)))?;
        let weights: HashMap<&'static str, f64> = DICTIONARY_WEIGHTS.iter().copied().collect();

        let terms = table
            .vocabulary()
            .into_iter()
            .map(|surface| {
                let weight = weights.get(surface.as_str()).copied().unwrap_or(DEFAULT_WEIGHT);
                LexiconTerm {
                    needle: surface.to_lowercase(),
                    surface,
                    weight,
                }
            })
            .collect();

        Ok(Self {
            terms,
            weights,
            stopwords: STOPWORDS.iter().copied().collect(),
            token_pattern,
            max_input_chars,
        })
    }

    /// Features of `text` without the length check
    pub fn features_of(&self, text: &str) -> Features {
        let normalized = normalize_text(text);
        let mut features = Features::new();
        if normalized.is_empty() {
            return features;
        }

        for term in &self.terms {
            if normalized.contains(term.needle.as_str()) {
                insert_max(&mut features, &term.surface, term.weight);
            }
        }

        for token in self.token_pattern.find_iter(&normalized) {
            let token = token.as_str();
            if self.stopwords.contains(token) {
                continue;
            }
            let weight = self.weights.get(token).copied().unwrap_or(DEFAULT_WEIGHT);
            insert_max(&mut features, token, weight);
        }

        features
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

fn insert_max(features: &mut Features, key: &str, weight: f64) {
    features
        .entry(key.to_string())
        .and_modify(|w| *w = w.max(weight))
        .or_insert(weight);
}

#[async_trait::async_trait]
impl FeatureExtractor for LexiconExtractor {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    async fn extract(&self, text: &str) -> std::result::Result<Features, ExtractionFailure> {
        let len = text.chars().count();
        if len > self.max_input_chars {
            return Err(ExtractionFailure::InputTooLong {
                len,
                max: self.max_input_chars,
            });
        }
        Ok(self.features_of(text))
    }
}
