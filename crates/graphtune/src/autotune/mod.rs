//! Autotuning support: redzone verification, candidate selection and result logging.
//!
//! A typical pass looks like:
//!
//! 1. [`AutotuneOptions::from_env`] once at the call boundary.
//! 2. For every candidate: [`wrap_redzone_best_effort`] the output and scratch
//!    buffers, run the kernel, then [`check_redzones`].
//! 3. [`select_best_algorithm`] (or [`select_best_plan`]) over all results.
//! 4. [`log_autotune_results`] with the full result list.

pub mod logger;
pub mod options;
pub mod redzone;
pub mod result;
pub mod select;

pub use logger::{
    ActivationMode, AutotuneLog, AutotuneSink, ConvBuffers, ConvolutionKind, ConvolutionParams, DataLayout, DeviceIdentity, ElementType, MetricsSink, OperationDescriptor, TensorDescriptor, log_autotune_results
};
pub use options::AutotuneOptions;
pub use redzone::{RedzoneAllocator, RedzoneCheckOutcome, check_redzones, wrap_redzone_best_effort};
pub use result::{AlgorithmChoice, AlgorithmDesc, AutotuneFailure, CandidateResult, FailureKind, PlanIndices};
pub use select::{select_best_algorithm, select_best_plan, select_plan_with_options, select_with_options};
