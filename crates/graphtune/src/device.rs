//! Value types and the device-context service consumed by the autotuner and graph cache.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Stable identifier of a device context, assigned by whoever creates the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Opaque driver handle of a compiled, launchable execution graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphExecHandle(u64);

impl GraphExecHandle {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A region of device memory. Only the address and size are tracked here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceMemory {
    pub address: u64,
    pub size: u64,
}

impl DeviceMemory {
    #[inline]
    pub const fn new(address: u64, size: u64) -> Self {
        Self { address, size }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.address == 0
    }
}

/// Library version triple. Defaults to all zeros when the version is unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionInfo {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComputeCapability {
    pub major: u32,
    pub minor: u32,
}

impl ComputeCapability {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sm_{}{}", self.major, self.minor)
    }
}

/// A constant baked into an executable that must live in device memory before launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantGlobal {
    /// Allocation slot the constant is bound to.
    pub allocation_index: usize,
    /// Symbol name inside the loaded module.
    pub symbol: String,
    pub content: Vec<u8>,
}

/// Driver services for one device context.
///
/// Implementations must be callable from many threads at once; the graph cache
/// serialises its own calls to [`DeviceContext::destroy_graph`] per context.
pub trait DeviceContext: Send + Sync {
    fn context_id(&self) -> ContextId;

    /// Version of the DNN library bound to this device.
    fn dnn_version(&self) -> Result<VersionInfo, DriverError>;

    fn compute_capability(&self) -> ComputeCapability;

    /// PCI bus location, e.g. `0000:3b:00.0`.
    fn pci_bus_id(&self) -> String;

    /// Version string of the BLAS library, when one is loaded and answers.
    fn blas_version(&self) -> Option<String> {
        None
    }

    /// Release a compiled execution graph. Called at most once per handle.
    fn destroy_graph(&self, graph: GraphExecHandle) -> Result<(), DriverError>;

    /// Load constants into device memory, returning one buffer per constant in order.
    fn load_constant_globals(&self, constants: &[ConstantGlobal]) -> Result<Vec<DeviceMemory>, DriverError> {
        if constants.is_empty() {
            return Ok(Vec::new());
        }
        Err(DriverError::Unsupported("load_constant_globals"))
    }
}
