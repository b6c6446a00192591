//! Alignment engine integration tests
//!
//! Similarity is fully controlled through the table-driven mock oracle, so
//! every merge decision below can be checked by hand.

mod helpers;

use bitext_align::engine::{AlignmentBudget, AlignmentConfig, AlignmentEngine, ToleranceMode};
use bitext_align::services::embedding::EmbeddingError;
use bitext_align::{AlignError, AlignmentOutcome, DegradedReason, MergeStrategy, Side};
use helpers::{origins, seq, tiles, MockOracle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn engine(oracle: &Arc<MockOracle>, config: AlignmentConfig) -> AlignmentEngine {
    AlignmentEngine::new(oracle.clone(), config)
}

/// X matches P; "Y Z" matches Q exactly, "X Y" is a poor match for P
fn mergeable_oracle() -> MockOracle {
    MockOracle::new()
        .with("X", &[1.0, 0.0, 0.0])
        .with("Y", &[0.0, 1.0, 0.0])
        .with("Z", &[0.0, 0.0, 1.0])
        .with("P", &[1.0, 0.0, 0.0])
        .with("Q", &[0.0, 1.0, 1.0])
        .with("X Y", &[1.0, 1.0, 0.0])
        .with("Y Z", &[0.0, 1.0, 1.0])
}

/// Every merge loses similarity: "X Y" by ~0.29, "Y Z" by 1.0
fn unmergeable_oracle() -> MockOracle {
    MockOracle::new()
        .with("X", &[1.0, 0.0, 0.0])
        .with("Y", &[0.0, 1.0, 0.0])
        .with("Z", &[0.0, 0.0, 1.0])
        .with("P", &[1.0, 0.0, 0.0])
        .with("Q", &[0.0, 1.0, 0.0])
        .with("X Y", &[1.0, 1.0, 0.0])
        .with("Y Z", &[0.0, 0.0, 1.0])
}

fn texts(outcome: &AlignmentOutcome) -> Vec<(String, String)> {
    outcome
        .pairs()
        .iter()
        .map(|p| (p.text_a.clone(), p.text_b.clone()))
        .collect()
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_equal_lengths_pair_positionally_without_merging() {
    // Scores are deliberately poor: parity alone decides
    let oracle = Arc::new(
        MockOracle::new()
            .with("Hello", &[1.0, 0.0])
            .with("World", &[0.0, 1.0])
            .with("Bonjour", &[0.0, 1.0])
            .with("Monde", &[1.0, 0.0]),
    );
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["Hello", "World"]), seq(Side::B, &["Bonjour", "Monde"]))
        .await
        .unwrap();

    assert!(outcome.is_balanced());
    assert_eq!(texts(&outcome), vec![pair("Hello", "Bonjour"), pair("World", "Monde")]);
    assert!(outcome.result().merges.is_empty());
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_adjacent_pair_with_best_gain_is_merged() {
    let oracle = Arc::new(mergeable_oracle());
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    assert!(outcome.is_balanced());
    assert_eq!(texts(&outcome), vec![pair("X", "P"), pair("Y Z", "Q")]);

    let result = outcome.result();
    assert_eq!(result.merges.len(), 1);
    assert_eq!(result.merges[0].side, Side::A);
    assert_eq!(result.merges[0].index, 1);
    assert!(result.merges[0].delta > 0.0);
    assert_eq!(result.pairs[1].origin_a, Some(1..3));
    assert!((result.pairs[1].score.unwrap() - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_no_acceptable_merge_is_degraded_not_an_error() {
    let oracle = Arc::new(unmergeable_oracle());
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = &outcome else {
        panic!("expected degraded outcome, got {:?}", outcome);
    };
    assert_eq!(degraded.residual, 1);
    assert_eq!(degraded.longer, Side::A);
    match degraded.reason {
        DegradedReason::ToleranceNotMet { best_delta } => {
            assert!((best_delta - (std::f32::consts::FRAC_1_SQRT_2 - 1.0)).abs() < 1e-5)
        }
        ref other => panic!("unexpected reason {:?}", other),
    }
    // Pre-merge pairing, excess element padded
    assert_eq!(
        texts(&outcome),
        vec![pair("X", "P"), pair("Y", "Q"), pair("Z", "")]
    );
    assert_eq!(outcome.pairs()[2].origin_b, None);
    assert_eq!(outcome.pairs()[2].score, None);
}

#[tokio::test]
async fn test_merges_apply_to_the_longer_side_b() {
    let oracle = Arc::new(mergeable_oracle());
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["P", "Q"]), seq(Side::B, &["X", "Y", "Z"]))
        .await
        .unwrap();

    assert!(outcome.is_balanced());
    assert_eq!(texts(&outcome), vec![pair("P", "X"), pair("Q", "Y Z")]);
    assert_eq!(outcome.result().merges[0].side, Side::B);
}

// ============================================================================
// Invariants
// ============================================================================

#[tokio::test]
async fn test_coverage_and_order_hold_for_balanced_and_degraded() {
    let oracle = Arc::new(
        MockOracle::new()
            .with("a1", &[1.0, 0.0, 0.0, 0.0])
            .with("a2", &[0.0, 1.0, 0.0, 0.0])
            .with("a3", &[0.0, 0.0, 1.0, 0.0])
            .with("a4", &[0.0, 0.0, 0.0, 1.0])
            .with("a5", &[0.5, 0.5, 0.0, 0.0])
            .with("b1", &[1.0, 0.1, 0.0, 0.0])
            .with("b2", &[0.0, 1.0, 1.0, 1.0])
            .with("a1 a2", &[1.0, 1.0, 0.0, 0.0])
            .with("a2 a3", &[0.0, 1.0, 1.0, 0.0])
            .with("a3 a4", &[0.0, 0.0, 1.0, 1.0])
            .with("a4 a5", &[0.5, 0.5, 0.0, 1.0])
            .with("a1 a2 a3", &[1.0, 1.0, 1.0, 0.0])
            .with("a2 a3 a4", &[0.0, 1.0, 1.0, 1.0])
            .with("a3 a4 a5", &[0.5, 0.5, 1.0, 1.0])
            .with("a2 a3 a4 a5", &[0.5, 1.5, 1.0, 1.0])
            .with("a1 a2 a3 a4", &[1.0, 1.0, 1.0, 1.0]),
    );
    let a = ["a1", "a2", "a3", "a4", "a5"];
    let b = ["b1", "b2"];

    for tolerance in [-2.0, -0.3, -0.01, 0.0] {
        let config = AlignmentConfig {
            tolerance,
            ..AlignmentConfig::default()
        };
        let outcome = engine(&oracle, config)
            .align(seq(Side::A, &a), seq(Side::B, &b))
            .await
            .unwrap();
        let pairs = outcome.pairs();

        assert!(tiles(&origins(pairs, Side::A), a.len()), "tolerance {}", tolerance);
        assert!(tiles(&origins(pairs, Side::B), b.len()), "tolerance {}", tolerance);

        let joined_a: Vec<&str> = pairs
            .iter()
            .map(|p| p.text_a.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        assert_eq!(joined_a.join(" "), a.join(" "));

        // Termination bound
        assert!(outcome.result().merges.len() <= a.len() - b.len());
        assert_eq!(outcome.result().merges.len() + outcome.residual(), a.len() - b.len());
    }
}

#[tokio::test]
async fn test_identical_inputs_give_identical_pairs() {
    let first = engine(&Arc::new(mergeable_oracle()), AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();
    let second = engine(&Arc::new(mergeable_oracle()), AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    assert_eq!(first.pairs(), second.pairs());
    assert_eq!(first.result().merges, second.result().merges);
}

#[tokio::test]
async fn test_equal_gains_merge_leftmost_first() {
    // "a b" and "b c" both match their anchor perfectly
    let oracle = Arc::new(
        MockOracle::new()
            .with("a", &[1.0, 0.0])
            .with("b", &[1.0, 0.0])
            .with("c", &[1.0, 0.0])
            .with("p", &[0.0, 1.0])
            .with("q", &[0.0, 1.0])
            .with("a b", &[1.0, 1.0])
            .with("b c", &[1.0, 1.0]),
    );
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["a", "b", "c"]), seq(Side::B, &["p", "q"]))
        .await
        .unwrap();

    assert_eq!(outcome.result().merges[0].index, 0);
    assert_eq!(texts(&outcome)[0], pair("a b", "p"));
}

#[tokio::test]
async fn test_each_text_is_embedded_once_per_call() {
    let oracle = Arc::new(mergeable_oracle());
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    // One call for the matrix, one for the candidates of the single iteration
    assert_eq!(oracle.calls(), 2);
    assert_eq!(outcome.result().stats.oracle_calls, 2);
    assert_eq!(outcome.result().stats.texts_embedded, 7);

    let embedded = oracle.embedded();
    let mut unique = embedded.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), embedded.len());
}

// ============================================================================
// Input and oracle failures
// ============================================================================

#[tokio::test]
async fn test_both_empty_is_input_mismatch_without_oracle_calls() {
    let oracle = Arc::new(MockOracle::new());
    let err = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &[]), seq(Side::B, &[]))
        .await
        .unwrap_err();

    assert!(matches!(err, AlignError::InputMismatch(_)));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_one_empty_side_is_degraded_without_oracle_calls() {
    let oracle = Arc::new(MockOracle::new());
    let outcome = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &[]), seq(Side::B, &["p", "q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = &outcome else {
        panic!("expected degraded outcome");
    };
    assert_eq!(degraded.reason, DegradedReason::EmptyCounterpart);
    assert_eq!(degraded.residual, 2);
    assert_eq!(texts(&outcome), vec![pair("", "p"), pair("", "q")]);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_swapped_sides_rejected() {
    let oracle = Arc::new(MockOracle::new());
    let err = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::B, &["x"]), seq(Side::A, &["y"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AlignError::InputMismatch(_)));
}

#[tokio::test]
async fn test_wrong_dimensionality_fails_the_request() {
    let oracle = Arc::new(
        MockOracle::new()
            .with("x", &[1.0, 0.0])
            .with("y", &[1.0, 0.0, 0.0]),
    );
    let err = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["x"]), seq(Side::B, &["y"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AlignError::EmbeddingUnavailable(EmbeddingError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[tokio::test]
async fn test_oracle_failure_mid_search_fails_the_request() {
    let oracle = Arc::new(mergeable_oracle().failing_on_call(2));
    let err = engine(&oracle, AlignmentConfig::default())
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AlignError::EmbeddingUnavailable(EmbeddingError::Unavailable(_))));
    // Retrying is the oracle's business; the engine gives up on the first error
    assert_eq!(oracle.calls(), 2);
}

// ============================================================================
// Tolerance modes and strategies
// ============================================================================

#[tokio::test]
async fn test_looser_tolerance_accepts_a_losing_merge() {
    let oracle = Arc::new(unmergeable_oracle());
    let config = AlignmentConfig {
        tolerance: -0.5,
        ..AlignmentConfig::default()
    };
    let outcome = engine(&oracle, config)
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    assert!(outcome.is_balanced());
    assert_eq!(texts(&outcome), vec![pair("X Y", "P"), pair("Z", "Q")]);
}

#[tokio::test]
async fn test_cumulative_budget_bounds_total_drift() {
    let oracle = Arc::new(unmergeable_oracle());
    let config = AlignmentConfig {
        tolerance: -0.5,
        tolerance_mode: ToleranceMode::Cumulative { budget: -0.1 },
        ..AlignmentConfig::default()
    };
    let outcome = engine(&oracle, config)
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = outcome else {
        panic!("expected degraded outcome");
    };
    assert!(matches!(degraded.reason, DegradedReason::CumulativeDriftExceeded { .. }));
}

/// X matches P; the tail Y, Z, W together match Q
fn three_way_oracle() -> MockOracle {
    MockOracle::new()
        .with("X", &[1.0, 0.0, 0.0, 0.0])
        .with("Y", &[0.0, 1.0, 0.0, 0.0])
        .with("Z", &[0.0, 0.0, 1.0, 0.0])
        .with("W", &[0.0, 0.0, 0.0, 1.0])
        .with("P", &[1.0, 0.0, 0.0, 0.0])
        .with("Q", &[0.0, 1.0, 1.0, 1.0])
        .with("X Y", &[1.0, 1.0, 0.0, 0.0])
        .with("Y Z", &[0.0, 1.0, 1.0, 0.0])
        .with("Z W", &[0.0, 0.0, 1.0, 1.0])
        .with("X Y Z", &[1.0, 1.0, 1.0, 0.0])
        .with("Y Z W", &[0.0, 1.0, 1.0, 1.0])
}

#[tokio::test]
async fn test_greedy_and_global_agree_on_a_clear_partition() {
    let a = ["X", "Y", "Z", "W"];
    let b = ["P", "Q"];

    let greedy = engine(&Arc::new(three_way_oracle()), AlignmentConfig::default())
        .align(seq(Side::A, &a), seq(Side::B, &b))
        .await
        .unwrap();
    let global_config = AlignmentConfig {
        strategy: MergeStrategy::Global,
        ..AlignmentConfig::default()
    };
    let global = engine(&Arc::new(three_way_oracle()), global_config)
        .align(seq(Side::A, &a), seq(Side::B, &b))
        .await
        .unwrap();

    let expected = vec![pair("X", "P"), pair("Y Z W", "Q")];
    assert_eq!(texts(&greedy), expected);
    assert_eq!(texts(&global), expected);

    // Greedy merges twice; global collapses the group in one step
    assert_eq!(greedy.result().merges.len(), 2);
    assert_eq!(global.result().merges.len(), 1);
    assert_eq!(global.result().merges[0].width, 3);
    assert_eq!(global.pairs()[1].origin_a, Some(1..4));

    // Stats count merge records, not collapsed paragraphs
    assert_eq!(greedy.result().stats.merges, 2);
    assert_eq!(global.result().stats.merges, 1);
}

#[tokio::test]
async fn test_global_strategy_respects_tolerance() {
    let config = AlignmentConfig {
        strategy: MergeStrategy::Global,
        ..AlignmentConfig::default()
    };
    let outcome = engine(&Arc::new(unmergeable_oracle()), config)
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = &outcome else {
        panic!("expected degraded outcome");
    };
    assert!(matches!(degraded.reason, DegradedReason::ToleranceNotMet { .. }));
    assert_eq!(
        texts(&outcome),
        vec![pair("X", "P"), pair("Y", "Q"), pair("Z", "")]
    );
}

// ============================================================================
// Budgets
// ============================================================================

#[tokio::test]
async fn test_merge_budget_keeps_progress() {
    let config = AlignmentConfig {
        max_merges: Some(1),
        ..AlignmentConfig::default()
    };
    let outcome = engine(&Arc::new(three_way_oracle()), config)
        .align(seq(Side::A, &["X", "Y", "Z", "W"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = &outcome else {
        panic!("expected degraded outcome");
    };
    assert_eq!(degraded.reason, DegradedReason::MergeBudgetExhausted { max_merges: 1 });
    assert_eq!(degraded.residual, 1);
    assert_eq!(degraded.partial.merges.len(), 1);
    assert_eq!(
        texts(&outcome),
        vec![pair("X", "P"), pair("Y Z", "Q"), pair("W", "")]
    );
}

#[tokio::test]
async fn test_cancelled_budget_stops_before_embedding() {
    let oracle = Arc::new(mergeable_oracle());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = engine(&oracle, AlignmentConfig::default())
        .align_with_budget(
            seq(Side::A, &["X", "Y", "Z"]),
            seq(Side::B, &["P", "Q"]),
            AlignmentBudget::default().with_cancel(token),
        )
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = outcome else {
        panic!("expected degraded outcome");
    };
    assert_eq!(degraded.reason, DegradedReason::Cancelled);
    assert_eq!(degraded.partial.pairs.len(), 3);
}

#[tokio::test]
async fn test_deadline_interrupts_a_slow_oracle() {
    let oracle = Arc::new(mergeable_oracle().with_delay(Duration::from_millis(500)));
    let config = AlignmentConfig {
        timeout: Some(Duration::from_millis(20)),
        ..AlignmentConfig::default()
    };

    let outcome = engine(&oracle, config)
        .align(seq(Side::A, &["X", "Y", "Z"]), seq(Side::B, &["P", "Q"]))
        .await
        .unwrap();

    let AlignmentOutcome::Degraded(degraded) = outcome else {
        panic!("expected degraded outcome");
    };
    assert_eq!(degraded.reason, DegradedReason::DeadlineExceeded);
    assert!(degraded.partial.stats.elapsed < Duration::from_millis(500));
}
