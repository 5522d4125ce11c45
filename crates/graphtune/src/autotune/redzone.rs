//! Guard-region wrapping and verification around autotuning buffers.
//!
//! Both steps are best-effort. An allocator that cannot provide guarded memory,
//! or cannot complete a check, only disables the safety net, with one warning
//! per process. Detected corruption is recorded on the candidate so the
//! selector skips it; it is never returned as an error.

use graphtune_instrumentation::{MetricEvent, WarnOnce, record_metric_async};
use tracing::{error, warn};

use super::{AutotuneFailure, AutotuneOptions, CandidateResult, FailureKind};
use crate::{device::DeviceMemory, error::DriverError};

/// Result of inspecting every guard region handed out by an allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedzoneCheckOutcome {
    Clean,
    Corrupted {
        /// Human-readable description of the first corrupted region.
        msg: String,
        /// Address of the user buffer whose guard was modified.
        user_buffer_address: u64,
    },
}

impl RedzoneCheckOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Allocator that surrounds each allocation with guard regions it can later verify.
pub trait RedzoneAllocator {
    /// Allocate `size` usable bytes with guard regions on both sides.
    fn allocate_bytes(&mut self, size: u64) -> Result<DeviceMemory, DriverError>;

    /// Inspect the guards of every allocation made so far.
    fn check_redzones(&self) -> Result<RedzoneCheckOutcome, DriverError>;
}

static ALLOCATION_FAILURE: WarnOnce = WarnOnce::new();
static CHECK_FAILURE: WarnOnce = WarnOnce::new();

/// Swap `buffer` for a guarded buffer of the same size, or hand it back unchanged.
pub fn wrap_redzone_best_effort<A>(allocator: &mut A, buffer: DeviceMemory, options: &AutotuneOptions) -> DeviceMemory
where
    A: RedzoneAllocator + ?Sized,
{
    wrap_guarded(allocator, buffer, options, &ALLOCATION_FAILURE)
}

fn wrap_guarded<A>(allocator: &mut A, buffer: DeviceMemory, options: &AutotuneOptions, site: &WarnOnce) -> DeviceMemory
where
    A: RedzoneAllocator + ?Sized,
{
    if !options.redzone_check {
        return buffer;
    }
    match allocator.allocate_bytes(buffer.size) {
        Ok(guarded) => guarded,
        Err(err) => {
            if site.first() {
                warn!(
                    error = %err,
                    "Failed to allocate memory for redzone checking; skipping this check. This is benign and only \
                     means out-of-bounds reads and writes will not be detected. This message will only be printed once."
                );
            }
            buffer
        }
    }
}

/// Verify the guards written during the last candidate run and mark `result` failed on corruption.
pub fn check_redzones<A>(allocator: &A, result: &mut CandidateResult, options: &AutotuneOptions)
where
    A: RedzoneAllocator + ?Sized,
{
    verify_guards(allocator, result, options, &CHECK_FAILURE);
}

fn verify_guards<A>(allocator: &A, result: &mut CandidateResult, options: &AutotuneOptions, site: &WarnOnce)
where
    A: RedzoneAllocator + ?Sized,
{
    if !options.redzone_check {
        return;
    }
    let outcome = match allocator.check_redzones() {
        Ok(outcome) => outcome,
        Err(err) => {
            if site.first() {
                warn!(
                    "Failed to check kernels for out-of-bounds reads and writes with an error message: '{err}'; \
                     skipping this check. This message will only be printed once."
                );
            }
            return;
        }
    };

    if let RedzoneCheckOutcome::Corrupted { msg, user_buffer_address } = outcome {
        error!(
            algo_id = result.algorithm.algo_id,
            "Detected out-of-bounds write in a kernel buffer. This is likely a driver or library bug. The algorithm \
             will be skipped, but device state may already be corrupted and later results may be incorrect."
        );
        error!("{msg}");
        record_metric_async!(MetricEvent::RedzoneViolation {
            algo_id: result.algorithm.algo_id,
            buffer_address: user_buffer_address,
            message: msg.clone(),
        });
        result.failure = Some(AutotuneFailure {
            kind: FailureKind::RedzoneModified,
            msg,
            buffer_address: Some(user_buffer_address),
        });
    }
}

/// True once the allocation-failure warning has been printed in this process.
pub fn allocation_warning_emitted() -> bool {
    ALLOCATION_FAILURE.has_fired()
}

/// True once the check-failure warning has been printed in this process.
pub fn check_warning_emitted() -> bool {
    CHECK_FAILURE.has_fired()
}

#[path = "redzone.test.rs"]
mod tests;
