use thiserror::Error;

use crate::device::ComputeCapability;

/// Errors reported by the external driver services this crate consumes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("device allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: u64 },
    #[error("redzone check could not complete: {0}")]
    CheckFailed(String),
    #[error("driver call {call} failed: {message}")]
    Call { call: &'static str, message: String },
    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),
}

impl DriverError {
    pub fn call(call: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            call,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum GraphtuneError {
    /// Every candidate failed; carries the exhaustion message for the selection kind.
    #[error("{0}")]
    NotFound(String),
    #[error("executable was built for compute capability {expected} but the device reports {actual}")]
    IncompatibleDevice {
        expected: ComputeCapability,
        actual: ComputeCapability,
    },
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}
