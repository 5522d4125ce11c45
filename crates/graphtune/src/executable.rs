//! A compiled GPU program plus the per-context state needed to launch it.

use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;
use tracing::{debug, info_span};

use crate::{
    caching::{BufferLayoutKey, CacheStatistics, GraphCacheConfig, GraphCacheRegistry}, device::{
        ComputeCapability, ConstantGlobal, ContextId, DeviceContext, DeviceMemory, GraphExecHandle
    }, error::{DriverError, GraphtuneError}
};

/// Device buffers holding an executable's constants, keyed by allocation index.
pub type ConstantBuffers = FxHashMap<usize, DeviceMemory>;

/// How the caller should run the program for one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphLaunch {
    /// Launch this cached graph.
    Graph(GraphExecHandle),
    /// The program cannot be captured; run its thunks directly.
    Eager,
}

/// Owns the graph caches and constant buffers of one executable across contexts.
///
/// Dropping the executable destroys every cached graph through its context.
pub struct GpuExecutable {
    name: String,
    compute_capability: ComputeCapability,
    constants: Vec<ConstantGlobal>,
    can_use_graph_capture: bool,
    registry: GraphCacheRegistry,
    constant_buffers: Mutex<FxHashMap<ContextId, Arc<ConstantBuffers>>>,
}

impl GpuExecutable {
    /// Graph cache capacity is read from the environment.
    pub fn new(name: impl Into<String>, compute_capability: ComputeCapability) -> Self {
        Self {
            name: name.into(),
            compute_capability,
            constants: Vec::new(),
            can_use_graph_capture: true,
            registry: GraphCacheRegistry::from_env(),
            constant_buffers: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_constants(mut self, constants: Vec<ConstantGlobal>) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_graph_capture(mut self, allowed: bool) -> Self {
        self.can_use_graph_capture = allowed;
        self
    }

    pub fn with_graph_cache(mut self, config: GraphCacheConfig) -> Self {
        self.registry = GraphCacheRegistry::new(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compute_capability(&self) -> ComputeCapability {
        self.compute_capability
    }

    /// False when the program contains operations that cannot run inside a captured graph.
    pub fn can_use_graph_capture(&self) -> bool {
        self.can_use_graph_capture
    }

    /// Fail unless `context` reports the compute capability this program was built for.
    pub fn check_compatibility(&self, context: &dyn DeviceContext) -> Result<(), GraphtuneError> {
        let actual = context.compute_capability();
        if actual != self.compute_capability {
            return Err(GraphtuneError::IncompatibleDevice {
                expected: self.compute_capability,
                actual,
            });
        }
        Ok(())
    }

    /// Load the constants into `context` on first use and return their buffers.
    pub fn resolve_constant_globals(&self, context: &Arc<dyn DeviceContext>) -> Result<Arc<ConstantBuffers>, GraphtuneError> {
        let context_id = context.context_id();
        let mut resolved = self.constant_buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(buffers) = resolved.get(&context_id) {
            return Ok(Arc::clone(buffers));
        }

        let loaded = context.load_constant_globals(&self.constants)?;
        if loaded.len() != self.constants.len() {
            return Err(DriverError::call(
                "load_constant_globals",
                format!("returned {} buffers for {} constants", loaded.len(), self.constants.len()),
            )
            .into());
        }

        let buffers: ConstantBuffers = self
            .constants
            .iter()
            .zip(loaded)
            .map(|(constant, memory)| (constant.allocation_index, memory))
            .collect();
        debug!(executable = %self.name, context = %context_id, constants = buffers.len(), "resolved constant globals");

        let buffers = Arc::new(buffers);
        resolved.insert(context_id, Arc::clone(&buffers));
        Ok(buffers)
    }

    /// Decide how to launch the program on `context` for the buffers described by `key`.
    ///
    /// On a cache miss `build` compiles a graph from the resolved constants and
    /// the result is cached. The returned handle stays owned by the cache.
    pub fn graph_for<F>(&self, context: &Arc<dyn DeviceContext>, key: &BufferLayoutKey, build: F) -> Result<GraphLaunch, GraphtuneError>
    where
        F: FnOnce(&ConstantBuffers) -> Result<GraphExecHandle, GraphtuneError>,
    {
        let span = info_span!("graph_for", executable = %self.name, context = %context.context_id());
        let _enter = span.enter();

        self.check_compatibility(context.as_ref())?;
        let constants = self.resolve_constant_globals(context)?;
        if !self.can_use_graph_capture {
            return Ok(GraphLaunch::Eager);
        }

        let cache = self.registry.cache_for(context);
        let graph = cache.get_or_insert_with(key, |_| build(&constants))?;
        Ok(GraphLaunch::Graph(graph))
    }

    pub fn set_graph_cache_capacity(&self, capacity: usize) {
        self.registry.set_capacity(capacity);
    }

    pub fn graph_cache_len(&self, context_id: ContextId) -> usize {
        self.registry.len(context_id)
    }

    pub fn graph_cache_statistics(&self) -> FxHashMap<ContextId, CacheStatistics> {
        self.registry.statistics()
    }

    /// Destroy every cached graph and forget resolved constants. Returns how many graphs were released.
    pub fn release(&self) -> usize {
        self.constant_buffers.lock().unwrap_or_else(PoisonError::into_inner).clear();
        let released = self.registry.release_all();
        debug!(executable = %self.name, released, "released executable graphs");
        released
    }
}

impl std::fmt::Debug for GpuExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuExecutable")
            .field("name", &self.name)
            .field("compute_capability", &self.compute_capability)
            .field("constants", &self.constants.len())
            .field("can_use_graph_capture", &self.can_use_graph_capture)
            .field("registry", &self.registry)
            .finish()
    }
}

#[path = "executable.test.rs"]
mod tests;
