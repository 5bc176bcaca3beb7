//! Rule-based tier: fixed literal lookup
//!
//! Terminal tier. The first rule whose literal occurs in the normalized text
//! selects its line; when nothing matches, hexagram 1 line 1 is returned with
//! [`DEFAULT_CONFIDENCE`]. Never fails.

use std::sync::Arc;
use std::time::Duration;

use super::{TierRequest, TierSelection, TierStrategy};
use crate::error::MapperError;
use crate::reference::ReferenceTable;
use crate::types::{LineId, SourceTier};

/// Confidence of a rule match
pub const RULE_CONFIDENCE: f64 = 0.3;

/// Confidence of the no-match default
pub const DEFAULT_CONFIDENCE: f64 = 0.05;

/// Literal -> (hexagram_id, line_position), checked in order
pub const RULES: [(&str, u8, u8); 21] = [
    ("全陽", 1, 6),
    ("全陰", 2, 6),
    ("リーダー", 1, 5),
    ("閉塞", 12, 1),
    ("調和", 11, 5),
    ("完成", 63, 6),
    ("成功", 63, 5),
    ("危険", 29, 3),
    ("困難", 39, 3),
    ("決断", 43, 5),
    ("変化", 49, 4),
    ("協力", 8, 2),
    ("家族", 37, 2),
    ("恋愛", 31, 2),
    ("結婚", 54, 5),
    ("学", 4, 2),
    ("争", 6, 2),
    ("待", 5, 1),
    ("新", 64, 1),
    ("始", 3, 1),
    ("健康", 27, 1),
];

pub struct RuleBasedExtractor {
    table: Arc<ReferenceTable>,
    budget: Duration,
}

impl RuleBasedExtractor {
    pub fn new(table: Arc<ReferenceTable>, budget: Duration) -> Self {
        Self { table, budget }
    }

    /// First matching rule, or the low-confidence default
    pub fn lookup(&self, normalized_text: &str) -> TierSelection {
        RULES
            .iter()
            .find(|(literal, _, _)| normalized_text.contains(literal))
            .and_then(|(_, h, p)| LineId::new(*h, *p))
            .map(|id| TierSelection {
                line: self.table.get(id).clone(),
                confidence: RULE_CONFIDENCE,
            })
            .unwrap_or_else(|| self.default_selection())
    }

    /// Hexagram 1, line 1 at minimal confidence
    pub fn default_selection(&self) -> TierSelection {
        TierSelection {
            line: self.table.get(LineId { hexagram_id: 1, line_position: 1 }).clone(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

#[async_trait::async_trait]
impl TierStrategy for RuleBasedExtractor {
    fn tier(&self) -> SourceTier {
        SourceTier::RuleBased
    }

    fn budget(&self) -> Duration {
        self.budget
    }

    async fn attempt(&self, request: &TierRequest<'_>) -> Result<TierSelection, MapperError> {
        Ok(self.lookup(request.normalized_text))
    }
}
