#![cfg(test)]

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt as _;

use super::*;
use crate::{
    autotune::AlgorithmDesc, tests::support::{CapturedEvents, MockRedzoneAllocator}
};

fn candidate() -> CandidateResult {
    CandidateResult::succeeded(AlgorithmDesc::new(12, true), std::time::Duration::from_micros(40), 0)
}

#[test]
fn wrap_returns_guarded_buffer_when_enabled() {
    let mut allocator = MockRedzoneAllocator::default();
    let original = DeviceMemory::new(0x1000, 256);

    let wrapped = wrap_redzone_best_effort(&mut allocator, original, &AutotuneOptions::default());
    assert_ne!(wrapped, original);
    assert_eq!(wrapped.size, original.size);
    assert_eq!(allocator.allocations(), vec![wrapped]);
}

#[test]
fn disabled_checking_is_a_pass_through() {
    let mut allocator = MockRedzoneAllocator::default();
    allocator.corrupt_with("guard at +8 overwritten", 0x2000);
    let options = AutotuneOptions::default().redzone_check(false);

    let guarded = DeviceMemory::new(0x7000, 64);
    let wrapped = wrap_redzone_best_effort(&mut allocator, guarded, &options);
    assert_eq!(wrapped, guarded);
    assert!(allocator.allocations().is_empty());

    let mut result = candidate();
    check_redzones(&allocator, &mut result, &options);
    assert!(result.is_usable());
    assert_eq!(allocator.checks(), 0);
}

#[test]
fn disabling_between_calls_stops_further_checks() {
    let mut allocator = MockRedzoneAllocator::default();
    let mut options = AutotuneOptions::default();
    let _ = wrap_redzone_best_effort(&mut allocator, DeviceMemory::new(0x10, 32), &options);

    let mut first = candidate();
    check_redzones(&allocator, &mut first, &options);
    assert_eq!(allocator.checks(), 1);

    options = options.redzone_check(false);
    allocator.corrupt_with("late corruption", 0x10);
    let mut second = candidate();
    check_redzones(&allocator, &mut second, &options);
    assert_eq!(allocator.checks(), 1);
    assert!(second.is_usable());
}

#[test]
fn allocation_failure_falls_back_and_warns_at_most_once() {
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());

    let mut allocator = MockRedzoneAllocator::default();
    allocator.fail_allocations();
    let original = DeviceMemory::new(0x4000, 1024);

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..3 {
            let wrapped = wrap_redzone_best_effort(&mut allocator, original, &AutotuneOptions::default());
            assert_eq!(wrapped, original);
        }
    });

    assert!(allocation_warning_emitted());
    assert!(captured.count_at(Level::WARN) <= 1);
}

#[test]
fn allocation_failure_warning_is_logged_exactly_once_per_site() {
    let site = WarnOnce::new();
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());

    let mut allocator = MockRedzoneAllocator::default();
    allocator.fail_allocations();
    let original = DeviceMemory::new(0x4000, 1024);

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..3 {
            assert_eq!(wrap_guarded(&mut allocator, original, &AutotuneOptions::default(), &site), original);
        }
    });

    assert!(site.has_fired());
    let warnings = captured.messages_at(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("printed once"));
    assert!(warnings[0].contains("Failed to allocate memory for redzone checking"));
}

#[test]
fn check_failure_is_absorbed() {
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());

    let mut allocator = MockRedzoneAllocator::default();
    allocator.fail_checks("device lost");
    let mut result = candidate();

    tracing::subscriber::with_default(subscriber, || {
        check_redzones(&allocator, &mut result, &AutotuneOptions::default());
        check_redzones(&allocator, &mut result, &AutotuneOptions::default());
    });

    assert!(result.is_usable());
    assert!(check_warning_emitted());
    assert!(captured.count_at(Level::WARN) <= 1);
    assert_eq!(captured.count_at(Level::ERROR), 0);
}

#[test]
fn check_failure_warning_is_logged_exactly_once_per_site() {
    let site = WarnOnce::new();
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());

    let mut allocator = MockRedzoneAllocator::default();
    allocator.fail_checks("device lost");
    let mut result = candidate();

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..3 {
            verify_guards(&allocator, &mut result, &AutotuneOptions::default(), &site);
        }
    });

    assert!(result.is_usable());
    let warnings = captured.messages_at(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("device lost"));
    assert!(warnings[0].contains("printed once"));
}

#[test]
fn corruption_marks_candidate_failed_and_logs_errors() {
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());

    let mut allocator = MockRedzoneAllocator::default();
    allocator.corrupt_with("redzone mismatch at offset 4", 0xbeef_0000);
    let mut result = candidate();

    tracing::subscriber::with_default(subscriber, || {
        check_redzones(&allocator, &mut result, &AutotuneOptions::default());
    });

    let failure = result.failure.as_ref().expect("corruption should be recorded");
    assert_eq!(failure.kind, FailureKind::RedzoneModified);
    assert_eq!(failure.msg, "redzone mismatch at offset 4");
    assert_eq!(failure.buffer_address, Some(0xbeef_0000));
    assert_eq!(captured.count_at(Level::ERROR), 2);
    assert!(captured.messages().iter().any(|m| m.contains("redzone mismatch at offset 4")));
}

#[test]
fn corrupted_candidate_is_excluded_from_selection() {
    let mut allocator = MockRedzoneAllocator::default();
    let options = AutotuneOptions::default();

    let mut fast = CandidateResult::succeeded(AlgorithmDesc::new(1, false), std::time::Duration::from_millis(1), 0);
    allocator.corrupt_with("overrun", 0x99);
    check_redzones(&allocator, &mut fast, &options);

    allocator.clear_corruption();
    let mut slow = CandidateResult::succeeded(AlgorithmDesc::new(2, false), std::time::Duration::from_millis(9), 0);
    check_redzones(&allocator, &mut slow, &options);

    let choice = crate::autotune::select_best_algorithm(&[fast, slow], false).expect("slow candidate remains");
    assert_eq!(choice.algorithm.algo_id, 2);
}
