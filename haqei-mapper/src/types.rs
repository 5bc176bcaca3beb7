//! Core domain types
//!
//! The symbol space is 64 hexagrams x 6 line positions = 384 line states.
//! `LineId` orders them lexicographically by `(hexagram_id, line_position)`;
//! its flat index is the canonical iteration order for scoring and noise draws.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of hexagrams
pub const HEXAGRAM_COUNT: u8 = 64;

/// Line positions per hexagram
pub const LINE_POSITIONS: u8 = 6;

/// Total addressable line states
pub const LINE_STATE_COUNT: usize = HEXAGRAM_COUNT as usize * LINE_POSITIONS as usize;

/// Weighted features extracted from input (token -> weight)
///
/// Ordered so iteration, serialization and tie handling are reproducible.
pub type Features = BTreeMap<String, f64>;

// ============================================================================
// Line identity
// ============================================================================

/// Identifies one of the 384 line states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId {
    pub hexagram_id: u8,
    pub line_position: u8,
}

impl LineId {
    /// Build a line id, rejecting out-of-range values
    pub fn new(hexagram_id: u8, line_position: u8) -> Option<Self> {
        if (1..=HEXAGRAM_COUNT).contains(&hexagram_id)
            && (1..=LINE_POSITIONS).contains(&line_position)
        {
            Some(Self {
                hexagram_id,
                line_position,
            })
        } else {
            None
        }
    }

    /// Flat index in canonical order: `(hexagram_id - 1) * 6 + (line_position - 1)`
    pub fn index(&self) -> usize {
        (self.hexagram_id as usize - 1) * LINE_POSITIONS as usize + (self.line_position as usize - 1)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= LINE_STATE_COUNT {
            return None;
        }
        Some(Self {
            hexagram_id: (index / LINE_POSITIONS as usize) as u8 + 1,
            line_position: (index % LINE_POSITIONS as usize) as u8 + 1,
        })
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hexagram_id, self.line_position)
    }
}

/// One immutable reference record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineState {
    pub hexagram_id: u8,
    pub line_position: u8,
    #[serde(default)]
    pub hexagram_name: String,
    pub position_weight: f64,
    pub exploration_noise: f64,
    pub keyword_set: Vec<String>,
    pub keyword_multiplier: f64,
    /// Recognized phrasings that earn the canonical bonus
    #[serde(default)]
    pub canonical_phrases: Vec<String>,
}

impl LineState {
    /// Identity of this record
    ///
    /// Records are validated on load, so the fields are always in range here.
    pub fn id(&self) -> LineId {
        LineId {
            hexagram_id: self.hexagram_id,
            line_position: self.line_position,
        }
    }
}

/// A scored line state, borrowed from the reference table
#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub line_state: &'a LineState,
    pub score: f64,
    /// Keyword contributions that raised the score
    pub contributing_features: BTreeMap<String, f64>,
}

// ============================================================================
// Results
// ============================================================================

/// Fallback tier that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTier {
    Full,
    Simplified,
    RuleBased,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Full => "full",
            SourceTier::Simplified => "simplified",
            SourceTier::RuleBased => "rule-based",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a returned result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOrigin {
    Hot,
    Warm,
    Cold,
    Computed,
}

impl CacheOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOrigin::Hot => "hot",
            CacheOrigin::Warm => "warm",
            CacheOrigin::Cold => "cold",
            CacheOrigin::Computed => "computed",
        }
    }
}

impl fmt::Display for CacheOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one mapping request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    pub selected_line: LineState,
    /// Score-gap confidence in [0, 1]
    pub confidence: f64,
    pub source_tier: SourceTier,
    pub cache_origin: CacheOrigin,
    pub timestamp_ms: i64,
    pub cache_key: String,
}

impl MappingResult {
    pub fn line_id(&self) -> LineId {
        self.selected_line.id()
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// One questionnaire answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub value: String,
}

impl Answer {
    pub fn new(question_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            value: value.into(),
        }
    }
}

/// Raw input to the mapping pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum MappingInput {
    Text(String),
    Answers(Vec<Answer>),
}

impl MappingInput {
    /// Cache key: `text:<normalized>` or `answers:q=v;q=v` in the given order
    pub fn cache_key(&self) -> String {
        match self {
            MappingInput::Text(text) => text_cache_key(text),
            MappingInput::Answers(answers) => answers_cache_key(answers),
        }
    }

    /// Normalized text seen by substring-based tiers
    pub fn surface_text(&self) -> String {
        match self {
            MappingInput::Text(text) => normalize_text(text),
            MappingInput::Answers(answers) => {
                let joined = answers
                    .iter()
                    .map(|a| a.value.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                normalize_text(&joined)
            }
        }
    }
}

/// Trim, lowercase and collapse internal whitespace runs to one space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn text_cache_key(text: &str) -> String {
    format!("text:{}", normalize_text(text))
}

pub fn answers_cache_key(answers: &[Answer]) -> String {
    let pairs = answers
        .iter()
        .map(|a| format!("{}={}", a.question_id, a.value))
        .collect::<Vec<_>>()
        .join(";");
    format!("answers:{}", pairs)
}
