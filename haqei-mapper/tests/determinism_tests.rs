//! Determinism of the mapping pipeline

mod helpers;

use std::sync::Arc;

use proptest::prelude::*;

use haqei_mapper::config::{FallbackConfig, ScoringConfig};
use haqei_mapper::determinism::{DeterminismGuarantor, DEFAULT_REPETITIONS};
use haqei_mapper::types::LineId;
use haqei_mapper::error::MapperError;
use haqei_mapper::fallback::ChainFactory;
use haqei_mapper::types::{Answer, MappingInput};

use helpers::{builtin_table, test_service, AlternatingExtractor, TEST_SEED};

fn factory(seed: &str) -> ChainFactory {
    let budgets = FallbackConfig {
        full_budget_ms: 5_000,
        simplified_budget_ms: 5_000,
        rule_based_budget_ms: 5_000,
    };
    ChainFactory::new(
        Arc::new(builtin_table()),
        ScoringConfig::default(),
        budgets,
        seed,
        2000,
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_service_verify_reports_every_input() {
    let service = test_service();
    let inputs = vec![
        MappingInput::Text("新しい挑戦".to_string()),
        MappingInput::Text("家族の調和".to_string()),
        MappingInput::Answers(vec![Answer::new("q1", "決断"), Answer::new("q2", "変化")]),
        MappingInput::Answers(vec![]),
    ];

    let report = service.verify_determinism(&inputs, None).await.unwrap();
    assert!(report.passed());
    assert_eq!(report.repetitions, DEFAULT_REPETITIONS);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.results.get("answers:q1=決断;q2=変化"), Some(&true));
}

#[tokio::test]
async fn test_verify_rejects_too_few_repetitions() {
    let service = test_service();
    let inputs = vec![MappingInput::Text("a".to_string())];
    let err = service.verify_determinism(&inputs, Some(1)).await.unwrap_err();
    assert!(matches!(err, MapperError::Configuration(_)));
}

#[tokio::test]
async fn test_unstable_extractor_is_reported_as_violation() {
    let guarantor = DeterminismGuarantor::new(
        factory(TEST_SEED).with_extractor(Arc::new(AlternatingExtractor::default())),
    );
    let inputs = vec![MappingInput::Text("同じ入力".to_string())];

    let err = guarantor.verify(&inputs, 2).await.unwrap_err();
    let MapperError::DeterminismViolation(violation) = err else {
        panic!("expected a determinism violation, got {:?}", err);
    };
    assert_eq!(violation.differing.len(), 1);
    let divergent = &violation.differing[0];
    assert_eq!(divergent.input, "text:同じ入力");
    assert_eq!(divergent.outputs.len(), 2);
    assert_ne!(divergent.outputs[0], divergent.outputs[1]);
}

#[tokio::test]
async fn test_check_marks_unstable_input_failed() {
    let guarantor = DeterminismGuarantor::new(
        factory(TEST_SEED).with_extractor(Arc::new(AlternatingExtractor::default())),
    );
    let inputs = vec![MappingInput::Text("揺れる".to_string())];

    let report = guarantor.check(&inputs, 3).await.unwrap();
    assert!(!report.passed());
    assert_eq!(report.results["text:揺れる"], false);
    assert_eq!(report.differing.len(), 1);

    let outputs: &[LineId] = &report.differing[0].outputs;
    assert_eq!(outputs.len(), 3);
    // Calls alternate, so the first and third runs agree
    assert_eq!(outputs[0], outputs[2]);
    assert_ne!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_guarantor_matches_service_results() {
    let service = test_service();
    let guarantor = DeterminismGuarantor::new(factory(TEST_SEED));
    let text = "困難な試練に挑戦している";

    let mapped = service.map_text(text).await;
    let chain = factory(TEST_SEED).build().unwrap();
    let input = MappingInput::Text(text.to_string());
    let normalized = input.surface_text();
    let key = input.cache_key();
    let outcome = chain
        .run(&haqei_mapper::fallback::TierRequest {
            input: &input,
            normalized_text: &normalized,
            cache_key: &key,
        })
        .await;

    assert_eq!(outcome.selection.line.id(), mapped.line_id());
    assert!(guarantor.check(&[input], 3).await.unwrap().passed());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_fresh_chains_agree(text in "\\PC{0,60}") {
        let rt = runtime();
        let guarantor = DeterminismGuarantor::new(factory(TEST_SEED));
        let report = rt
            .block_on(guarantor.check(&[MappingInput::Text(text)], 3))
            .unwrap();
        prop_assert!(report.passed(), "{:?}", report.differing);
    }

    #[test]
    fn prop_whitespace_variants_share_a_line(words in prop::collection::vec("[a-z家族協力困難]{1,6}", 1..5)) {
        let rt = runtime();
        let chain = factory(TEST_SEED).build().unwrap();
        let compact = MappingInput::Text(words.join(" "));
        let padded = MappingInput::Text(format!("  {}\t", words.join("   ")));
        prop_assert_eq!(compact.cache_key(), padded.cache_key());

        let line_of = |input: &MappingInput| {
            let normalized = input.surface_text();
            let key = input.cache_key();
            rt.block_on(chain.run(&haqei_mapper::fallback::TierRequest {
                input,
                normalized_text: &normalized,
                cache_key: &key,
            }))
            .selection
            .line
            .id()
        };
        prop_assert_eq!(line_of(&compact), line_of(&padded));
    }
}
