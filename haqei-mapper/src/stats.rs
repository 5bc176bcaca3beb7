//! Selection statistics
//!
//! Counts every result the service returns, by line state, source tier and
//! cache origin. Read through [`SelectionStats::snapshot`] for `GET /stats`.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::cache::CacheStats;
use crate::types::{CacheOrigin, LineId, MappingResult, SourceTier, LINE_POSITIONS, LINE_STATE_COUNT};

/// Lines listed in `most_selected` / `least_selected`
pub const RANKING_LENGTH: usize = 5;

#[derive(Debug, Clone)]
pub struct SelectionStats {
    total: u64,
    by_tier: BTreeMap<SourceTier, u64>,
    by_origin: BTreeMap<CacheOrigin, u64>,
    /// Indexed by `LineId::index()`
    line_counts: Vec<u64>,
}

impl Default for SelectionStats {
    fn default() -> Self {
        Self {
            total: 0,
            by_tier: BTreeMap::new(),
            by_origin: BTreeMap::new(),
            line_counts: vec![0; LINE_STATE_COUNT],
        }
    }
}

/// Count for one line state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCount {
    pub line: LineId,
    pub hexagram_name: String,
    pub count: u64,
}

/// Serializable view of the statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub by_tier: BTreeMap<SourceTier, u64>,
    pub by_origin: BTreeMap<CacheOrigin, u64>,
    /// Selections per line position 1-6
    pub position_distribution: BTreeMap<u8, u64>,
    /// Non-zero counts keyed by `"hexagram-position"`
    pub line_counts: BTreeMap<String, u64>,
    pub most_selected: Vec<LineCount>,
    pub least_selected: Vec<LineCount>,
    pub cache: CacheStats,
}

impl SelectionStats {
    pub fn record(&mut self, result: &MappingResult) {
        self.total += 1;
        *self.by_tier.entry(result.source_tier).or_insert(0) += 1;
        *self.by_origin.entry(result.cache_origin).or_insert(0) += 1;
        if let Some(count) = self.line_counts.get_mut(result.line_id().index()) {
            *count += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, line: LineId) -> u64 {
        self.line_counts.get(line.index()).copied().unwrap_or(0)
    }

    /// `names` maps a line to its hexagram name for the ranking lists
    pub fn snapshot(&self, cache: CacheStats, names: impl Fn(LineId) -> String) -> StatsSnapshot {
        let mut position_distribution: BTreeMap<u8, u64> =
            (1..=LINE_POSITIONS).map(|p| (p, 0)).collect();
        let mut line_counts = BTreeMap::new();
        let mut ranked: Vec<(LineId, u64)> = Vec::with_capacity(LINE_STATE_COUNT);

        for (index, count) in self.line_counts.iter().enumerate() {
            let Some(id) = LineId::from_index(index) else {
                continue;
            };
            *position_distribution.entry(id.line_position).or_insert(0) += count;
            if *count > 0 {
                line_counts.insert(id.to_string(), *count);
            }
            ranked.push((id, *count));
        }

        let to_line_count = |(line, count): &(LineId, u64)| LineCount {
            line: *line,
            hexagram_name: names(*line),
            count: *count,
        };

        // Stable sorts: equal counts stay in canonical order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let most_selected = ranked
            .iter()
            .filter(|(_, count)| *count > 0)
            .take(RANKING_LENGTH)
            .map(to_line_count)
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        let least_selected = ranked.iter().take(RANKING_LENGTH).map(to_line_count).collect();

        StatsSnapshot {
            total: self.total,
            by_tier: self.by_tier.clone(),
            by_origin: self.by_origin.clone(),
            position_distribution,
            line_counts,
            most_selected,
            least_selected,
            cache,
        }
    }
}
