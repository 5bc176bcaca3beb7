//! haqei-mapper configuration
//!
//! The TOML file carries the shared bootstrap fields (`root_folder`,
//! `[logging]`, `[server]`) plus the mapper sections:
//!
//! ```toml
//! [mapper]
//! seed = "haqei-production"
//! reference_data = "/srv/haqei/lines.json"
//!
//! [scoring]
//! position_weights = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
//!
//! [cache]
//! hot_capacity = 1000
//!
//! [fallback]
//! full_budget_ms = 30
//! ```
//!
//! Scoring constants are tunable only by redeployment; nothing mutates them
//! at runtime.

use haqei_common::config::TomlConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MapperError, Result};

/// Full configuration file for haqei-mapper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(flatten)]
    pub common: TomlConfig,

    #[serde(default)]
    pub mapper: MapperSection,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl MapperConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.mapper.validate()?;
        self.scoring.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

// ============================================================================
// [mapper]
// ============================================================================

/// General mapper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperSection {
    /// Base seed for every random source; required
    #[serde(default)]
    pub seed: Option<String>,

    /// JSON reference data file; built-in dataset when absent
    #[serde(default)]
    pub reference_data: Option<PathBuf>,

    /// TTL requested when caching mapping results
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// Repetitions per input for determinism verification
    #[serde(default = "default_verify_repetitions")]
    pub verify_repetitions: usize,

    /// Longest input the default extractor accepts
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for MapperSection {
    fn default() -> Self {
        Self {
            seed: None,
            reference_data: None,
            result_ttl_secs: default_result_ttl_secs(),
            verify_repetitions: default_verify_repetitions(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl MapperSection {
    fn validate(&self) -> Result<()> {
        if self.verify_repetitions < crate::determinism::MIN_REPETITIONS {
            return Err(MapperError::Configuration(format!(
                "verify_repetitions must be at least {}",
                crate::determinism::MIN_REPETITIONS
            )));
        }
        if self.max_input_chars == 0 {
            return Err(MapperError::Configuration(
                "max_input_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

fn default_result_ttl_secs() -> u64 {
    86_400
}

fn default_verify_repetitions() -> usize {
    3
}

fn default_max_input_chars() -> usize {
    2000
}

/// Resolve the seed: explicit value (CLI or `HAQEI_SEED`) wins over TOML
///
/// # Errors
/// `MapperError::Configuration` when no source provides a non-empty seed.
pub fn resolve_seed(cli_seed: Option<String>, config: &MapperConfig) -> Result<String> {
    let seed = cli_seed.or_else(|| config.mapper.seed.clone());
    match seed {
        Some(seed) if !seed.trim().is_empty() => Ok(seed),
        Some(_) => Err(MapperError::Configuration(
            "seed is empty; set [mapper] seed, HAQEI_SEED or --seed".to_string(),
        )),
        None => Err(MapperError::Configuration(
            "no seed configured; set [mapper] seed, HAQEI_SEED or --seed".to_string(),
        )),
    }
}

// ============================================================================
// [scoring]
// ============================================================================

/// Per-position scoring constants (index 0 = line position 1)
///
/// Defaults keep every position at the same base weight so no position is
/// structurally under-selected; keywords and hints decide between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_position_weights")]
    pub position_weights: [f64; 6],

    #[serde(default = "default_exploration_noise")]
    pub exploration_noise: [f64; 6],

    #[serde(default = "default_keyword_multipliers")]
    pub keyword_multipliers: [f64; 6],

    /// Relative bonus for a canonical phrase match (0.10 = +10%)
    #[serde(default = "default_canonical_bonus")]
    pub canonical_bonus: f64,

    /// Additive bonus for line states at the hinted position
    #[serde(default = "default_position_hint_bonus")]
    pub position_hint_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            position_weights: default_position_weights(),
            exploration_noise: default_exploration_noise(),
            keyword_multipliers: default_keyword_multipliers(),
            canonical_bonus: default_canonical_bonus(),
            position_hint_bonus: default_position_hint_bonus(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let tables = [
            ("position_weights", &self.position_weights),
            ("exploration_noise", &self.exploration_noise),
            ("keyword_multipliers", &self.keyword_multipliers),
        ];
        for (name, values) in tables {
            if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(MapperError::Configuration(format!(
                    "scoring.{} contains invalid value {}",
                    name, bad
                )));
            }
        }
        for (name, value) in [
            ("canonical_bonus", self.canonical_bonus),
            ("position_hint_bonus", self.position_hint_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MapperError::Configuration(format!(
                    "scoring.{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_position_weights() -> [f64; 6] {
    [0.50; 6]
}

fn default_exploration_noise() -> [f64; 6] {
    [0.15; 6]
}

fn default_keyword_multipliers() -> [f64; 6] {
    [0.08, 0.08, 0.08, 0.08, 0.10, 0.08]
}

fn default_canonical_bonus() -> f64 {
    0.10
}

fn default_position_hint_bonus() -> f64 {
    0.05
}

// ============================================================================
// [cache]
// ============================================================================

/// Multi-tier cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hot tier entry bound
    #[serde(default = "default_hot_capacity")]
    pub hot_capacity: usize,

    #[serde(default = "default_true")]
    pub warm_enabled: bool,

    #[serde(default = "default_warm_ttl_secs")]
    pub warm_ttl_secs: u64,

    #[serde(default = "default_warm_budget_ms")]
    pub warm_budget_ms: u64,

    #[serde(default = "default_true")]
    pub cold_enabled: bool,

    #[serde(default = "default_cold_ttl_secs")]
    pub cold_ttl_secs: u64,

    #[serde(default = "default_cold_budget_ms")]
    pub cold_budget_ms: u64,

    /// Spawn warm/cold writes instead of awaiting them
    #[serde(default)]
    pub write_behind: bool,

    /// Health stays "degraded" this long after the last warm/cold failure
    #[serde(default = "default_degraded_window_secs")]
    pub degraded_window_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_capacity: default_hot_capacity(),
            warm_enabled: true,
            warm_ttl_secs: default_warm_ttl_secs(),
            warm_budget_ms: default_warm_budget_ms(),
            cold_enabled: true,
            cold_ttl_secs: default_cold_ttl_secs(),
            cold_budget_ms: default_cold_budget_ms(),
            write_behind: false,
            degraded_window_secs: default_degraded_window_secs(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hot_capacity == 0 {
            return Err(MapperError::Configuration(
                "cache.hot_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn warm_ttl(&self) -> Duration {
        Duration::from_secs(self.warm_ttl_secs)
    }

    pub fn cold_ttl(&self) -> Duration {
        Duration::from_secs(self.cold_ttl_secs)
    }

    pub fn warm_budget(&self) -> Duration {
        Duration::from_millis(self.warm_budget_ms)
    }

    pub fn cold_budget(&self) -> Duration {
        Duration::from_millis(self.cold_budget_ms)
    }

    pub fn degraded_window(&self) -> Duration {
        Duration::from_secs(self.degraded_window_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_hot_capacity() -> usize {
    1000
}

fn default_warm_ttl_secs() -> u64 {
    3600
}

fn default_warm_budget_ms() -> u64 {
    5
}

fn default_cold_ttl_secs() -> u64 {
    86_400
}

fn default_cold_budget_ms() -> u64 {
    10
}

fn default_degraded_window_secs() -> u64 {
    300
}

// ============================================================================
// [fallback]
// ============================================================================

/// Latency budgets for the fallback tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_full_budget_ms")]
    pub full_budget_ms: u64,

    #[serde(default = "default_simplified_budget_ms")]
    pub simplified_budget_ms: u64,

    #[serde(default = "default_rule_based_budget_ms")]
    pub rule_based_budget_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            full_budget_ms: default_full_budget_ms(),
            simplified_budget_ms: default_simplified_budget_ms(),
            rule_based_budget_ms: default_rule_based_budget_ms(),
        }
    }
}

impl FallbackConfig {
    pub fn full_budget(&self) -> Duration {
        Duration::from_millis(self.full_budget_ms)
    }

    pub fn simplified_budget(&self) -> Duration {
        Duration::from_millis(self.simplified_budget_ms)
    }

    pub fn rule_based_budget(&self) -> Duration {
        Duration::from_millis(self.rule_based_budget_ms)
    }
}

fn default_full_budget_ms() -> u64 {
    30
}

fn default_simplified_budget_ms() -> u64 {
    10
}

fn default_rule_based_budget_ms() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use haqei_common::config::parse_toml_config;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: MapperConfig = parse_toml_config("").unwrap();
        assert!(config.mapper.seed.is_none());
        assert_eq!(config.mapper.verify_repetitions, 3);
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.cache.warm_ttl_secs, 3600);
        assert_eq!(config.cache.cold_ttl_secs, 86_400);
        assert_eq!(config.fallback.full_budget_ms, 30);
        assert_eq!(config.common.server.port, 5780);
    }

    #[test]
    fn test_sections_parse_alongside_common_fields() {
        let toml = r#"
            root_folder = "/srv/haqei"

            [logging]
            level = "debug"

            [mapper]
            seed = "fixed"

            [scoring]
            position_weights = [0.4, 0.5, 0.5, 0.5, 0.6, 0.5]
            canonical_bonus = 0.2

            [cache]
            hot_capacity = 16
            write_behind = true

            [fallback]
            simplified_budget_ms = 12
        "#;
        let config: MapperConfig = parse_toml_config(toml).unwrap();
        assert_eq!(config.common.root_folder, Some(PathBuf::from("/srv/haqei")));
        assert_eq!(config.common.logging.level, "debug");
        assert_eq!(config.mapper.seed.as_deref(), Some("fixed"));
        assert_eq!(config.scoring.position_weights[4], 0.6);
        assert_eq!(config.scoring.canonical_bonus, 0.2);
        assert_eq!(config.scoring.exploration_noise, [0.15; 6]);
        assert_eq!(config.cache.hot_capacity, 16);
        assert!(config.cache.write_behind);
        assert_eq!(config.fallback.simplified_budget_ms, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut scoring = ScoringConfig::default();
        scoring.position_weights[2] = -0.1;
        assert!(matches!(scoring.validate(), Err(MapperError::Configuration(_))));
    }

    #[test]
    fn test_nan_bonus_rejected() {
        let scoring = ScoringConfig {
            canonical_bonus: f64::NAN,
            ..Default::default()
        };
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn test_single_repetition_rejected() {
        let mut config = MapperConfig::default();
        config.mapper.verify_repetitions = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_seed_priority() {
        let mut config = MapperConfig::default();
        config.mapper.seed = Some("from-toml".to_string());

        assert_eq!(resolve_seed(Some("from-cli".into()), &config).unwrap(), "from-cli");
        assert_eq!(resolve_seed(None, &config).unwrap(), "from-toml");
    }

    #[test]
    fn test_resolve_seed_missing_or_empty() {
        let config = MapperConfig::default();
        assert!(matches!(resolve_seed(None, &config), Err(MapperError::Configuration(_))));
        assert!(matches!(
            resolve_seed(Some("  ".into()), &config),
            Err(MapperError::Configuration(_))
        ));
    }
}
