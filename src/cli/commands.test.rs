#![cfg(test)]

use graphtune::GraphtuneError;

use super::*;

const BARE: &str = r#"[
    {"algorithm": {"algo_id": 0, "tensor_ops_enabled": false}, "run_time_us": 250.0, "scratch_bytes": 0},
    {"algorithm": {"algo_id": 1, "tensor_ops_enabled": true}, "run_time_us": 80.5, "scratch_bytes": 65536},
    {"algorithm": {"algo_id": 2, "tensor_ops_enabled": true}, "failure": {"kind": "REDZONE_MODIFIED", "msg": "overrun"}}
]"#;

#[test]
fn test_bare_result_list_is_accepted() {
    let input: ReplayInput = serde_json::from_str(BARE).expect("parse");
    assert!(matches!(input, ReplayInput::Bare(_)));
    assert_eq!(input.results().len(), 3);

    let choice = select_with_options(input.results(), &AutotuneOptions::default()).expect("select");
    assert_eq!(choice.algorithm.algo_id, 1);
    assert_eq!(choice.algorithm_no_scratch.map(|a| a.algo_id), Some(0));
}

#[test]
fn test_record_without_operation_is_accepted() {
    let raw = format!(r#"{{"results": {BARE}}}"#);
    let input: ReplayInput = serde_json::from_str(&raw).expect("parse");
    match &input {
        ReplayInput::Record { instr, device, results } => {
            assert!(instr.is_none());
            assert!(device.is_none());
            assert_eq!(results.len(), 3);
        }
        other => panic!("expected record input, got {other:?}"),
    }
}

#[test]
fn test_all_failed_input_reports_not_found() {
    let raw = r#"[{"algorithm": {"algo_id": 4, "tensor_ops_enabled": false}, "failure": {"kind": "WRONG_RESULT"}}]"#;
    let input: ReplayInput = serde_json::from_str(raw).expect("parse");
    match select_plan_with_options(input.results(), &AutotuneOptions::default()) {
        Err(GraphtuneError::NotFound(msg)) => assert_eq!(msg, "No execution plan worked!"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_an_io_error() {
    match read_input(Path::new("/nonexistent/graphtune/results.json")) {
        Err(CliError::Io { path, .. }) => assert_eq!(path, Path::new("/nonexistent/graphtune/results.json")),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn test_cache_sim_evicts_and_releases() {
    let args = CacheSimArgs {
        capacity: Some(2),
        contexts: 1,
        keys: vec![1, 2, 1, 3, 2, 1],
    };
    let report = simulate_cache(&args);

    assert_eq!(report.capacity, 2);
    assert_eq!(report.launches, 6);
    // 1 miss, 2 miss, 1 hit, 3 miss (evicts 2), 2 miss (evicts 1), 1 miss (evicts 3)
    assert_eq!(report.builds, 5);
    assert_eq!(report.contexts.len(), 1);
    let ctx = &report.contexts[0];
    assert_eq!(ctx.statistics.hits, 1);
    assert_eq!(ctx.statistics.evictions, 3);
    assert_eq!(ctx.destroyed, 3);
    assert_eq!(report.released, 2);
}

#[test]
fn test_cache_sim_spreads_launches_over_contexts() {
    let args = CacheSimArgs {
        capacity: Some(4),
        contexts: 2,
        keys: vec![7, 7, 7, 7],
    };
    let report = simulate_cache(&args);

    assert_eq!(report.builds, 2);
    assert_eq!(report.contexts.iter().map(|c| c.statistics.hits).sum::<u64>(), 2);
    assert_eq!(report.released, 2);
}

#[test]
fn test_cache_sim_accepts_full_range_key_ids() {
    let args = CacheSimArgs {
        capacity: Some(2),
        contexts: 1,
        keys: vec![u64::MAX, 1 << 48, u64::MAX, 0],
    };
    let report = simulate_cache(&args);

    assert_eq!(report.builds, 3);
    assert_eq!(report.contexts[0].statistics.hits, 1);
    assert_eq!(report.contexts[0].statistics.evictions, 1);
    assert_eq!(report.released, 2);
}
