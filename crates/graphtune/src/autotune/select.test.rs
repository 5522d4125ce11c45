#![cfg(test)]

use std::time::Duration;

use super::*;
use crate::autotune::{AlgorithmDesc, FailureKind};

fn ok(algo_id: i64, millis: u64, scratch_bytes: u64) -> CandidateResult {
    CandidateResult::succeeded(AlgorithmDesc::new(algo_id, false), Duration::from_millis(millis), scratch_bytes)
}

fn failed(algo_id: i64) -> CandidateResult {
    CandidateResult::failed(AlgorithmDesc::new(algo_id, false), FailureKind::WrongResult, "mismatch")
}

fn mixed_set() -> Vec<CandidateResult> {
    vec![ok(1, 10, 0), ok(2, 5, 128), failed(3)]
}

#[test]
fn fastest_usable_wins_and_zero_scratch_is_separate() {
    let choice = select_best_algorithm(&mixed_set(), false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 2);
    assert_eq!(choice.algorithm_no_scratch.map(|a| a.algo_id), Some(1));
}

#[test]
fn deterministic_mode_takes_first_usable_in_order() {
    let choice = select_best_algorithm(&mixed_set(), true).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 1);
    assert_eq!(choice.algorithm_no_scratch.map(|a| a.algo_id), Some(1));
}

#[test]
fn deterministic_mode_is_sensitive_to_input_order() {
    let reordered = vec![failed(3), ok(2, 5, 128), ok(1, 10, 0)];
    let choice = select_best_algorithm(&reordered, true).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 2);
    assert_eq!(choice.algorithm_no_scratch.map(|a| a.algo_id), Some(1));

    for _ in 0..3 {
        assert_eq!(select_best_algorithm(&reordered, true).expect("stable"), choice);
    }
}

#[test]
fn exact_ties_keep_the_earlier_candidate() {
    let results = vec![ok(7, 4, 64), ok(8, 4, 0), ok(9, 4, 0)];
    let choice = select_best_algorithm(&results, false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 7);
    assert_eq!(choice.algorithm_no_scratch.map(|a| a.algo_id), Some(8));
}

#[test]
fn no_scratch_choice_absent_when_every_usable_candidate_needs_scratch() {
    let results = vec![ok(1, 3, 1), failed(2), ok(3, 2, 4096)];
    let choice = select_best_algorithm(&results, false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 3);
    assert!(choice.algorithm_no_scratch.is_none());
}

#[test]
fn failed_zero_scratch_candidates_are_not_fallbacks() {
    let mut broken = failed(4);
    broken.scratch_bytes = 0;
    broken.run_time = Some(Duration::from_micros(1));
    let results = vec![broken, ok(5, 9, 256)];
    let choice = select_best_algorithm(&results, false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 5);
    assert!(choice.algorithm_no_scratch.is_none());
}

#[test]
fn all_failed_is_not_found() {
    match select_best_algorithm(&[failed(1), failed(2)], false) {
        Err(GraphtuneError::NotFound(msg)) => assert_eq!(msg, NO_ALGORITHM_WORKED),
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(matches!(select_best_algorithm(&[], true), Err(GraphtuneError::NotFound(_))));
}

#[test]
fn unmeasured_usable_candidates_count_as_zero_time() {
    let mut unmeasured = ok(3, 0, 0);
    unmeasured.run_time = None;

    let results = vec![ok(2, 50, 0), unmeasured.clone()];
    let choice = select_best_algorithm(&results, false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 3);

    let mut zero = ok(1, 0, 0);
    zero.run_time = Some(Duration::ZERO);
    let tied = vec![zero, unmeasured.clone()];
    let choice = select_best_algorithm(&tied, false).expect("usable candidates exist");
    assert_eq!(choice.algorithm.algo_id, 1);

    let only_unmeasured = vec![unmeasured];
    let choice = select_best_algorithm(&only_unmeasured, false).expect("still usable");
    assert_eq!(choice.algorithm.algo_id, 3);
}

#[test]
fn plan_indices_follow_the_same_rules() {
    let picked = select_best_plan(&mixed_set(), false).expect("usable plans exist");
    assert_eq!(picked, PlanIndices { index: Some(1), index_no_scratch: Some(0) });
    assert_eq!(picked.as_raw(), (1, 0));

    let picked = select_best_plan(&mixed_set(), true).expect("usable plans exist");
    assert_eq!(picked, PlanIndices { index: Some(0), index_no_scratch: Some(0) });

    let scratch_only = vec![failed(0), ok(1, 3, 16)];
    let picked = select_best_plan(&scratch_only, false).expect("one usable plan");
    assert_eq!(picked.as_raw(), (1, -1));
}

#[test]
fn plan_selection_fails_only_when_both_indices_are_empty() {
    match select_best_plan(&[failed(0), failed(1)], false) {
        Err(GraphtuneError::NotFound(msg)) => assert_eq!(msg, NO_PLAN_WORKED),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn options_thread_determinism_through() {
    let options = AutotuneOptions::default().deterministic(true);
    assert_eq!(select_with_options(&mixed_set(), &options).expect("choice").algorithm.algo_id, 1);
    let options = options.deterministic(false);
    assert_eq!(select_plan_with_options(&mixed_set(), &options).expect("plan").index, Some(1));
}
