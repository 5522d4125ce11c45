//! Autotuning result selection and execution graph caching for a GPU backend.
//!
//! The crate does not talk to a driver itself. Device services are consumed
//! through [`device::DeviceContext`] and [`autotune::RedzoneAllocator`], and
//! telemetry is handed to an [`autotune::AutotuneSink`].

pub use error::{DriverError, GraphtuneError};

pub mod autotune;
pub mod caching;
pub mod device;
pub mod error;
pub mod executable;

mod tests;

pub use autotune::{AlgorithmChoice, AlgorithmDesc, AutotuneOptions, CandidateResult, PlanIndices, select_best_algorithm, select_best_plan};
pub use caching::{BufferLayoutKey, CacheStatistics, GraphCacheConfig, GraphCacheRegistry, GraphExecCache};
pub use device::{ComputeCapability, ContextId, DeviceContext, DeviceMemory, GraphExecHandle, VersionInfo};
pub use executable::{GpuExecutable, GraphLaunch};
