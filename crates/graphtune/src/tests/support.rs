//! Hand-rolled doubles for the driver services the crate consumes.

use std::{
    cell::Cell, fmt, sync::{
        Arc, Mutex, atomic::{AtomicBool, AtomicU64, Ordering}
    }
};

use tracing::{
    Event, Level, Subscriber, field::{Field, Visit}
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{
    autotune::{AutotuneLog, AutotuneSink, RedzoneAllocator, RedzoneCheckOutcome}, device::{
        ComputeCapability, ConstantGlobal, ContextId, DeviceContext, DeviceMemory, GraphExecHandle, VersionInfo
    }, error::DriverError
};

/// Device context that records destroyed graphs and can be told to misbehave.
pub(crate) struct MockDevice {
    id: ContextId,
    dnn_available: bool,
    blas_version: Option<String>,
    compute_capability: ComputeCapability,
    fail_destroy: AtomicBool,
    fail_constant_load: AtomicBool,
    destroyed: Mutex<Vec<GraphExecHandle>>,
    constant_loads: AtomicU64,
    next_address: AtomicU64,
}

impl MockDevice {
    pub(crate) fn new(id: ContextId) -> Self {
        Self {
            id,
            dnn_available: true,
            blas_version: None,
            compute_capability: ComputeCapability::new(8, 0),
            fail_destroy: AtomicBool::new(false),
            fail_constant_load: AtomicBool::new(false),
            destroyed: Mutex::new(Vec::new()),
            constant_loads: AtomicU64::new(0),
            next_address: AtomicU64::new(0x7f00_0000_0000 + (id.0 << 32)),
        }
    }

    pub(crate) fn with_blas_version(mut self, version: &str) -> Self {
        self.blas_version = Some(version.to_string());
        self
    }

    pub(crate) fn without_dnn(mut self) -> Self {
        self.dnn_available = false;
        self
    }

    pub(crate) fn with_compute_capability(mut self, major: u32, minor: u32) -> Self {
        self.compute_capability = ComputeCapability::new(major, minor);
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn fail_destroys(&self, fail: bool) {
        self.fail_destroy.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_constant_loads(&self, fail: bool) {
        self.fail_constant_load.store(fail, Ordering::SeqCst);
    }

    /// Handles passed to `destroy_graph`, in call order, including failed calls.
    pub(crate) fn destroyed(&self) -> Vec<GraphExecHandle> {
        self.destroyed.lock().expect("destroyed lock").clone()
    }

    pub(crate) fn constant_loads(&self) -> u64 {
        self.constant_loads.load(Ordering::SeqCst)
    }
}

impl DeviceContext for MockDevice {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn dnn_version(&self) -> Result<VersionInfo, DriverError> {
        if self.dnn_available {
            Ok(VersionInfo::new(9, 1, 0))
        } else {
            Err(DriverError::call("dnnGetVersion", "library not loaded"))
        }
    }

    fn compute_capability(&self) -> ComputeCapability {
        self.compute_capability
    }

    fn pci_bus_id(&self) -> String {
        format!("0000:00:{:02x}.0", self.id.0)
    }

    fn blas_version(&self) -> Option<String> {
        self.blas_version.clone()
    }

    fn destroy_graph(&self, graph: GraphExecHandle) -> Result<(), DriverError> {
        self.destroyed.lock().expect("destroyed lock").push(graph);
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(DriverError::call("graphExecDestroy", "invalid handle"));
        }
        Ok(())
    }

    fn load_constant_globals(&self, constants: &[ConstantGlobal]) -> Result<Vec<DeviceMemory>, DriverError> {
        if self.fail_constant_load.load(Ordering::SeqCst) {
            return Err(DriverError::call("moduleGetGlobal", "symbol not found"));
        }
        self.constant_loads.fetch_add(1, Ordering::SeqCst);
        Ok(constants
            .iter()
            .map(|constant| {
                let size = constant.content.len() as u64;
                let address = self.next_address.fetch_add(size.max(1).next_multiple_of(256), Ordering::SeqCst);
                DeviceMemory::new(address, size)
            })
            .collect())
    }
}

#[derive(Clone, Debug, Default)]
enum CheckBehaviour {
    #[default]
    Clean,
    Corrupted(String, u64),
    Fail(String),
}

/// Guard-region allocator whose check outcome is scripted by the test.
#[derive(Debug, Default)]
pub(crate) struct MockRedzoneAllocator {
    allocations: Vec<DeviceMemory>,
    fail_allocations: bool,
    behaviour: CheckBehaviour,
    checks: Cell<usize>,
}

impl MockRedzoneAllocator {
    const BASE_ADDRESS: u64 = 0x5a00_0000;

    pub(crate) fn allocations(&self) -> Vec<DeviceMemory> {
        self.allocations.clone()
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.get()
    }

    pub(crate) fn corrupt_with(&mut self, msg: &str, user_buffer_address: u64) {
        self.behaviour = CheckBehaviour::Corrupted(msg.to_string(), user_buffer_address);
    }

    pub(crate) fn clear_corruption(&mut self) {
        self.behaviour = CheckBehaviour::Clean;
    }

    pub(crate) fn fail_allocations(&mut self) {
        self.fail_allocations = true;
    }

    pub(crate) fn fail_checks(&mut self, msg: &str) {
        self.behaviour = CheckBehaviour::Fail(msg.to_string());
    }
}

impl RedzoneAllocator for MockRedzoneAllocator {
    fn allocate_bytes(&mut self, size: u64) -> Result<DeviceMemory, DriverError> {
        if self.fail_allocations {
            return Err(DriverError::AllocationFailed { bytes: size });
        }
        let address = self
            .allocations
            .last()
            .map_or(Self::BASE_ADDRESS, |last| last.address + last.size.next_multiple_of(256) + 512);
        let guarded = DeviceMemory::new(address, size);
        self.allocations.push(guarded);
        Ok(guarded)
    }

    fn check_redzones(&self) -> Result<RedzoneCheckOutcome, DriverError> {
        self.checks.set(self.checks.get() + 1);
        match &self.behaviour {
            CheckBehaviour::Clean => Ok(RedzoneCheckOutcome::Clean),
            CheckBehaviour::Corrupted(msg, address) => Ok(RedzoneCheckOutcome::Corrupted {
                msg: msg.clone(),
                user_buffer_address: *address,
            }),
            CheckBehaviour::Fail(msg) => Err(DriverError::CheckFailed(msg.clone())),
        }
    }
}

/// Autotune sink that keeps every record it is handed.
#[derive(Default)]
pub(crate) struct CollectingSink {
    records: Mutex<Vec<AutotuneLog>>,
}

impl CollectingSink {
    pub(crate) fn records(&self) -> Vec<AutotuneLog> {
        self.records.lock().expect("records lock").clone()
    }
}

impl AutotuneSink for CollectingSink {
    fn emit(&self, record: &AutotuneLog) {
        self.records.lock().expect("records lock").push(record.clone());
    }
}

/// Tracing layer that stores the level and rendered message of every event.
#[derive(Clone, Default)]
pub(crate) struct CapturedEvents {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedEvents {
    pub(crate) fn count_at(&self, level: Level) -> usize {
        self.events.lock().expect("events lock").iter().filter(|(l, _)| *l == level).count()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.events.lock().expect("events lock").iter().map(|(_, m)| m.clone()).collect()
    }

    /// Messages at `level`, in emission order.
    pub(crate) fn messages_at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .expect("events lock")
            .push((*event.metadata().level(), visitor.message));
    }
}
