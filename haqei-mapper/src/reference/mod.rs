//! Reference table of the 384 line states
//!
//! Loaded once at startup, validated, then shared read-only behind an `Arc`.
//! Records are stored in canonical order so `lines()[id.index()]` is the
//! record for `id`.
//!
//! **Sources:**
//! - JSON file (`{"lines": [...]}`), parsed with serde
//! - Built-in dataset assembled from [`builtin`] and `[scoring]` constants
//!
//! Any malformed or missing record is a fatal configuration error.

pub mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

use crate::config::ScoringConfig;
use crate::error::{MapperError, Result};
use crate::types::{LineId, LineState, HEXAGRAM_COUNT, LINE_POSITIONS, LINE_STATE_COUNT};

/// JSON layout of a reference data file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub lines: Vec<LineState>,
}

/// Validated, immutable set of 384 line states
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    lines: Vec<LineState>,
}

impl ReferenceTable {
    /// Validate records and sort them into canonical order
    ///
    /// # Errors
    /// `MapperError::Configuration` unless there are exactly 384 records,
    /// each `(hexagram_id, line_position)` appears once and in range, every
    /// weight is finite and non-negative, and no keyword set is empty.
    pub fn from_lines(mut lines: Vec<LineState>) -> Result<Self> {
        if lines.len() != LINE_STATE_COUNT {
            return Err(invalid(format!(
                "expected {} line states, found {}",
                LINE_STATE_COUNT,
                lines.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for line in &lines {
            let id = LineId::new(line.hexagram_id, line.line_position).ok_or_else(|| {
                invalid(format!(
                    "line ({}, {}) out of range",
                    line.hexagram_id, line.line_position
                ))
            })?;
            if !seen.insert(id) {
                return Err(invalid(format!("duplicate line {}", id)));
            }
            validate_constant(id, "position_weight", line.position_weight)?;
            validate_constant(id, "exploration_noise", line.exploration_noise)?;
            validate_constant(id, "keyword_multiplier", line.keyword_multiplier)?;
            if line.keyword_set.iter().all(|k| k.trim().is_empty()) {
                return Err(invalid(format!("line {} has an empty keyword set", id)));
            }
        }

        lines.sort_by_key(|line| line.id());
        Ok(Self { lines })
    }

    /// Parse and validate JSON reference data
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ReferenceFile = serde_json::from_str(json)
            .map_err(|e| invalid(format!("malformed reference JSON: {}", e)))?;
        Self::from_lines(file.lines)
    }

    /// Load reference data from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            invalid(format!("cannot read reference data {}: {}", path.display(), e))
        })?;
        let table = Self::from_json_str(&json)?;
        info!("Loaded {} line states from {}", table.len(), path.display());
        Ok(table)
    }

    /// Build the built-in dataset with the given scoring constants
    pub fn builtin(scoring: &ScoringConfig) -> Result<Self> {
        scoring.validate()?;

        let mut lines = Vec::with_capacity(LINE_STATE_COUNT);
        for hexagram_id in 1..=HEXAGRAM_COUNT {
            let name = builtin::HEXAGRAM_NAMES[hexagram_id as usize - 1];
            let (upper, lower) = trigrams_of(name)?;

            for line_position in 1..=LINE_POSITIONS {
                let p = line_position as usize - 1;
                let mut keywords: Vec<String> = Vec::new();

                for word in builtin::POSITION_KEYWORDS[p] {
                    push_unique(&mut keywords, word);
                }
                for word in builtin::HEXAGRAM_THEMES[hexagram_id as usize - 1] {
                    push_unique(&mut keywords, word);
                }
                for word in trigram_keywords(upper)?.iter().chain(trigram_keywords(lower)?) {
                    push_unique(&mut keywords, word);
                }
                let mut cues_added = 0;
                for cue in builtin::POSITION_CUES[p] {
                    if cues_added == builtin::CUES_PER_LINE {
                        break;
                    }
                    if push_unique(&mut keywords, cue) {
                        cues_added += 1;
                    }
                }
                push_unique(&mut keywords, builtin::POSITION_LABELS[p]);
                if upper == lower {
                    // Doubled trigram: the name and its classical trigram character
                    push_unique(&mut keywords, name);
                    if let Some(first) = name.chars().next() {
                        push_unique(&mut keywords, &first.to_string());
                    }
                }

                let mut canonical_phrases = vec![format!("{}{}", name, builtin::POSITION_LABELS[p])];
                for (h, pos, phrase) in builtin::SPECIAL_PHRASES {
                    if h == hexagram_id && pos == line_position {
                        canonical_phrases.push(phrase.to_string());
                        push_unique(&mut keywords, phrase);
                    }
                }

                lines.push(LineState {
                    hexagram_id,
                    line_position,
                    hexagram_name: name.to_string(),
                    position_weight: scoring.position_weights[p],
                    exploration_noise: scoring.exploration_noise[p],
                    keyword_set: keywords,
                    keyword_multiplier: scoring.keyword_multipliers[p],
                    canonical_phrases,
                });
            }
        }

        Self::from_lines(lines)
    }

    /// Load from `path` when given, otherwise build the built-in dataset
    pub fn load(path: Option<&Path>, scoring: &ScoringConfig) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => {
                let table = Self::builtin(scoring)?;
                info!("Using built-in reference data ({} line states)", table.len());
                Ok(table)
            }
        }
    }

    /// Serialize to the JSON file layout
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&ReferenceFile {
            lines: self.lines.clone(),
        })
        .map_err(|e| MapperError::Configuration(format!("cannot serialize reference data: {}", e)))
    }

    pub fn get(&self, id: LineId) -> &LineState {
        &self.lines[id.index()]
    }

    /// Records in canonical order
    pub fn lines(&self) -> &[LineState] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every distinct keyword and canonical phrase, sorted
    pub fn vocabulary(&self) -> BTreeSet<String> {
        self.lines
            .iter()
            .flat_map(|l| l.keyword_set.iter().chain(l.canonical_phrases.iter()))
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Append `word` unless already present; returns whether it was added
fn push_unique(keywords: &mut Vec<String>, word: &str) -> bool {
    if keywords.iter().any(|k| k == word) {
        false
    } else {
        keywords.push(word.to_string());
        true
    }
}

fn invalid(message: String) -> MapperError {
    MapperError::Configuration(format!("reference data: {}", message))
}

fn validate_constant(id: LineId, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("line {} has invalid {} {}", id, field, value)))
    }
}

/// Upper and lower trigram characters of a hexagram name
///
/// `X為Y` is the doubled trigram `Y`; otherwise the first two characters.
fn trigrams_of(name: &str) -> Result<(char, char)> {
    let chars: Vec<char> = name.chars().collect();
    match chars.as_slice() {
        [_, '為', t, ..] => Ok((*t, *t)),
        [upper, lower, ..] => Ok((*upper, *lower)),
        _ => Err(invalid(format!("cannot derive trigrams from {}", name))),
    }
}

fn trigram_keywords(symbol: char) -> Result<&'static [&'static str]> {
    builtin::TRIGRAM_KEYWORDS
        .iter()
        .find(|(c, _)| *c == symbol)
        .map(|(_, words)| *words)
        .ok_or_else(|| invalid(format!("unknown trigram {}", symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> ReferenceTable {
        ReferenceTable::builtin(&ScoringConfig::default()).unwrap()
    }

    #[test]
    fn test_builtin_has_384_lines_in_canonical_order() {
        let table = builtin();
        assert_eq!(table.len(), 384);
        for (index, line) in table.lines().iter().enumerate() {
            assert_eq!(line.id().index(), index);
        }
    }

    #[test]
    fn test_builtin_keyword_set_sizes() {
        for line in builtin().lines() {
            let n = line.keyword_set.len();
            assert!((16..=30).contains(&n), "line {} has {} keywords", line.id(), n);
        }
    }

    #[test]
    fn test_trigram_derivation() {
        assert_eq!(trigrams_of("乾為天").unwrap(), ('天', '天'));
        assert_eq!(trigrams_of("水雷屯").unwrap(), ('水', '雷'));
        assert_eq!(trigrams_of("雷澤歸妹").unwrap(), ('雷', '澤'));
        for name in builtin::HEXAGRAM_NAMES {
            let (u, l) = trigrams_of(name).unwrap();
            assert!(trigram_keywords(u).is_ok(), "{}", name);
            assert!(trigram_keywords(l).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_special_phrase_attached_to_single_line() {
        let table = builtin();
        let tai_five = table.get(LineId::new(11, 5).unwrap());
        assert!(tai_five.canonical_phrases.iter().any(|p| p == "大いなる調和"));
        let tai_four = table.get(LineId::new(11, 4).unwrap());
        assert!(!tai_four.canonical_phrases.iter().any(|p| p == "大いなる調和"));
    }

    #[test]
    fn test_builtin_uses_scoring_constants() {
        let scoring = ScoringConfig {
            position_weights: [0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            ..Default::default()
        };
        let table = ReferenceTable::builtin(&scoring).unwrap();
        assert_eq!(table.get(LineId::new(7, 3).unwrap()).position_weight, 0.3);
        assert_eq!(table.get(LineId::new(7, 5).unwrap()).keyword_multiplier, 0.10);
    }

    #[test]
    fn test_rejects_383_records() {
        let mut lines = builtin().lines().to_vec();
        lines.pop();
        assert!(matches!(
            ReferenceTable::from_lines(lines),
            Err(MapperError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut lines = builtin().lines().to_vec();
        lines[1] = lines[0].clone();
        let err = ReferenceTable::from_lines(lines).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_nan_weight() {
        let mut lines = builtin().lines().to_vec();
        lines[10].position_weight = f64::NAN;
        assert!(ReferenceTable::from_lines(lines).is_err());
    }

    #[test]
    fn test_rejects_empty_keyword_set() {
        let mut lines = builtin().lines().to_vec();
        lines[42].keyword_set.clear();
        assert!(ReferenceTable::from_lines(lines).is_err());
    }

    #[test]
    fn test_accepts_shuffled_records() {
        let mut lines = builtin().lines().to_vec();
        lines.reverse();
        let table = ReferenceTable::from_lines(lines).unwrap();
        assert_eq!(table, builtin());
    }

    #[test]
    fn test_json_round_trip_preserves_table() {
        let table = builtin();
        let json = table.to_json_pretty().unwrap();
        assert_eq!(ReferenceTable::from_json_str(&json).unwrap(), table);
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        assert!(matches!(
            ReferenceTable::from_json_str("{\"lines\": [1, 2]}"),
            Err(MapperError::Configuration(_))
        ));
    }
}
