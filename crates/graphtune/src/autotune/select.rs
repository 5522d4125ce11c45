//! Picks the winning candidate, and the winning zero-scratch candidate, from benchmark results.
//!
//! Both entry points share one linear scan. Among usable candidates the
//! fastest wins and a tie keeps the earlier candidate. A usable candidate with
//! no measured run time counts as taking zero time. In deterministic mode
//! run times are ignored and the first usable candidate of each partition wins.

use std::time::Duration;

use tracing::debug;

use super::{AlgorithmChoice, AutotuneOptions, CandidateResult, PlanIndices};
use crate::error::GraphtuneError;

pub const NO_ALGORITHM_WORKED: &str = "No algorithm worked!";
pub const NO_PLAN_WORKED: &str = "No execution plan worked!";

/// Select the primary and the zero-scratch algorithm.
///
/// Fails with [`GraphtuneError::NotFound`] when every candidate carries a failure.
pub fn select_best_algorithm(results: &[CandidateResult], deterministic: bool) -> Result<AlgorithmChoice, GraphtuneError> {
    let picked = scan(results, deterministic);
    let Some(best) = picked.index else {
        return Err(GraphtuneError::NotFound(NO_ALGORITHM_WORKED.to_string()));
    };

    let choice = AlgorithmChoice {
        algorithm: results[best].algorithm,
        algorithm_no_scratch: picked.index_no_scratch.map(|i| results[i].algorithm),
    };
    debug!(
        candidates = results.len(),
        deterministic,
        algorithm = %choice.algorithm,
        no_scratch = ?choice.algorithm_no_scratch.map(|a| a.algo_id),
        "selected autotune algorithm"
    );
    Ok(choice)
}

/// Index-returning variant for callers that keep results by position.
///
/// Fails only when neither index could be filled.
pub fn select_best_plan(results: &[CandidateResult], deterministic: bool) -> Result<PlanIndices, GraphtuneError> {
    let picked = scan(results, deterministic);
    if picked.index.is_none() && picked.index_no_scratch.is_none() {
        return Err(GraphtuneError::NotFound(NO_PLAN_WORKED.to_string()));
    }
    debug!(candidates = results.len(), deterministic, ?picked, "selected execution plan");
    Ok(picked)
}

/// [`select_best_algorithm`] with the determinism switch taken from `options`.
pub fn select_with_options(results: &[CandidateResult], options: &AutotuneOptions) -> Result<AlgorithmChoice, GraphtuneError> {
    select_best_algorithm(results, options.deterministic)
}

/// [`select_best_plan`] with the determinism switch taken from `options`.
pub fn select_plan_with_options(results: &[CandidateResult], options: &AutotuneOptions) -> Result<PlanIndices, GraphtuneError> {
    select_best_plan(results, options.deterministic)
}

fn scan(results: &[CandidateResult], deterministic: bool) -> PlanIndices {
    let mut picked = PlanIndices::default();
    for (i, candidate) in results.iter().enumerate() {
        if !candidate.is_usable() {
            continue;
        }
        if should_replace(results, picked.index, candidate, deterministic) {
            picked.index = Some(i);
        }
        if !candidate.needs_scratch() && should_replace(results, picked.index_no_scratch, candidate, deterministic) {
            picked.index_no_scratch = Some(i);
        }
    }
    picked
}

#[inline]
fn should_replace(results: &[CandidateResult], incumbent: Option<usize>, candidate: &CandidateResult, deterministic: bool) -> bool {
    match incumbent {
        None => true,
        Some(_) if deterministic => false,
        Some(i) => strictly_faster(candidate, &results[i]),
    }
}

#[inline]
fn strictly_faster(candidate: &CandidateResult, incumbent: &CandidateResult) -> bool {
    candidate.run_time.unwrap_or(Duration::ZERO) < incumbent.run_time.unwrap_or(Duration::ZERO)
}

#[path = "select.test.rs"]
mod tests;
