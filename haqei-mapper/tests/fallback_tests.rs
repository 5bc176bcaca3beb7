//! Fallback tier degradation through the public service

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use haqei_mapper::fallback::rule_based::{DEFAULT_CONFIDENCE, RULE_CONFIDENCE};
use haqei_mapper::fallback::simplified::CONFIDENCE_SCALE;
use haqei_mapper::types::{LineId, SourceTier};
use haqei_mapper::MappingService;

use helpers::{test_config, FailingExtractor, StallingExtractor};

fn service_with_failing_extractor() -> MappingService {
    MappingService::builder(test_config())
        .extractor(Arc::new(FailingExtractor))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_failing_extractor_never_surfaces_an_error() {
    let service = service_with_failing_extractor();
    for text in ["家族との協力", "リーダーとして", "zzz", "", "危険な深淵"] {
        let result = service.map_text(text).await;
        assert!(
            matches!(result.source_tier, SourceTier::Simplified | SourceTier::RuleBased),
            "{:?} -> {}",
            text,
            result.source_tier
        );
        assert!(result.confidence.is_finite());
    }
}

#[tokio::test]
async fn test_simplified_tier_matches_keywords() {
    let service = service_with_failing_extractor();
    let result = service.map_text("家族との協力").await;
    assert_eq!(result.source_tier, SourceTier::Simplified);
    // 家族 (hexagram 37 theme) plus 協力 (position 2 keyword)
    assert_eq!(result.line_id(), LineId::new(37, 2).unwrap());
    assert!(result.confidence <= CONFIDENCE_SCALE);
}

#[tokio::test]
async fn test_unmatched_text_gets_rule_based_default() {
    let service = service_with_failing_extractor();
    let result = service.map_text("zzz").await;
    assert_eq!(result.source_tier, SourceTier::RuleBased);
    assert_eq!(result.line_id(), LineId::new(1, 1).unwrap());
    assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
}

#[tokio::test]
async fn test_rule_table_used_when_keywords_miss() {
    let service = service_with_failing_extractor();

    // No reference keyword occurs in "学ぶ"; the rule for 学 does
    let result = service.map_text("学ぶ").await;
    assert_eq!(result.source_tier, SourceTier::RuleBased);
    assert_eq!(result.line_id(), LineId::new(4, 2).unwrap());
    assert_eq!(result.confidence, RULE_CONFIDENCE);
}

#[tokio::test]
async fn test_stalled_extractor_is_abandoned_after_budget() {
    let mut config = test_config();
    config.fallback.full_budget_ms = 30;
    let service = MappingService::builder(config)
        .extractor(Arc::new(StallingExtractor))
        .build()
        .unwrap();

    let started = Instant::now();
    let result = service.map_text("家族との協力").await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.source_tier, SourceTier::Simplified);
}

#[tokio::test]
async fn test_degraded_results_are_deterministic() {
    let a = service_with_failing_extractor();
    let b = service_with_failing_extractor();
    for text in ["家族との協力", "困難な挑戦", "新しい始まり"] {
        let ra = a.map_text(text).await;
        let rb = b.map_text(text).await;
        assert_eq!(ra.line_id(), rb.line_id());
        assert_eq!(ra.source_tier, rb.source_tier);
    }
}
