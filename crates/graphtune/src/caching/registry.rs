use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{BufferLayoutKey, CacheStatistics, GraphCacheConfig, GraphExecCache};
use crate::device::{ContextId, DeviceContext, GraphExecHandle};

/// One graph cache per device context, owned by a single executable.
///
/// Caches are created lazily on first use of a context. Dropping the registry
/// destroys every cached graph through its context.
pub struct GraphCacheRegistry {
    config: Mutex<GraphCacheConfig>,
    caches: Mutex<FxHashMap<ContextId, Arc<GraphExecCache>>>,
}

impl GraphCacheRegistry {
    pub fn new(config: GraphCacheConfig) -> Self {
        Self {
            config: Mutex::new(GraphCacheConfig::new(config.capacity)),
            caches: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(GraphCacheConfig::from_env())
    }

    fn caches(&self) -> MutexGuard<'_, FxHashMap<ContextId, Arc<GraphExecCache>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> GraphCacheConfig {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cache for `context`, created on first use with the configured capacity.
    pub fn cache_for(&self, context: &Arc<dyn DeviceContext>) -> Arc<GraphExecCache> {
        let context_id = context.context_id();
        let mut caches = self.caches();
        if let Some(cache) = caches.get(&context_id) {
            return Arc::clone(cache);
        }

        let capacity = self.config().capacity;
        debug!(context = %context_id, capacity, "creating graph cache");
        let cache = Arc::new(GraphExecCache::new(Arc::clone(context), capacity));
        caches.insert(context_id, Arc::clone(&cache));
        cache
    }

    /// The cache for `context_id`, if one was created.
    pub fn get(&self, context_id: ContextId) -> Option<Arc<GraphExecCache>> {
        self.caches().get(&context_id).cloned()
    }

    pub fn lookup(&self, context: &Arc<dyn DeviceContext>, key: &BufferLayoutKey) -> Option<GraphExecHandle> {
        self.cache_for(context).lookup(key)
    }

    pub fn insert(&self, context: &Arc<dyn DeviceContext>, key: BufferLayoutKey, graph: GraphExecHandle) -> GraphExecHandle {
        self.cache_for(context).insert(key, graph)
    }

    /// Apply `capacity` to every existing cache and to caches created later.
    pub fn set_capacity(&self, capacity: usize) {
        let config = GraphCacheConfig::new(capacity);
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
        for cache in self.caches().values() {
            cache.set_capacity(config.capacity);
        }
    }

    pub fn capacity(&self) -> usize {
        self.config().capacity
    }

    /// Number of resident graphs for `context_id`; zero when no cache exists yet.
    pub fn len(&self, context_id: ContextId) -> usize {
        self.get(context_id).map_or(0, |cache| cache.len())
    }

    /// Number of contexts with a cache.
    pub fn context_count(&self) -> usize {
        self.caches().len()
    }

    pub fn statistics(&self) -> FxHashMap<ContextId, CacheStatistics> {
        self.caches().iter().map(|(id, cache)| (*id, cache.statistics())).collect()
    }

    /// Destroy every cached graph in every context. Returns how many graphs were released.
    ///
    /// The caches stay registered and can be refilled afterwards.
    pub fn release_all(&self) -> usize {
        let caches: Vec<Arc<GraphExecCache>> = self.caches().values().cloned().collect();
        caches.iter().map(|cache| cache.release_all()).sum()
    }
}

impl Default for GraphCacheRegistry {
    fn default() -> Self {
        Self::new(GraphCacheConfig::default())
    }
}

impl Drop for GraphCacheRegistry {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            debug!(released, "graph cache registry dropped");
        }
    }
}

impl std::fmt::Debug for GraphCacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCacheRegistry")
            .field("capacity", &self.capacity())
            .field("contexts", &self.context_count())
            .finish()
    }
}
