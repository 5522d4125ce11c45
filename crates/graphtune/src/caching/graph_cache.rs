//! Bounded per-context cache of compiled execution graphs.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError}, time::Instant
};

use graphtune_instrumentation::{MetricEvent, record_metric_async};
use tracing::{debug, error, info_span, trace};

use super::{
    layout_key::BufferLayoutKey, lru::RecencyList, metrics::{CacheCounters, CacheStatistics, EntryMetadata}
};
use crate::device::{ContextId, DeviceContext, GraphExecHandle};

#[derive(Debug)]
struct CachedGraph {
    graph: GraphExecHandle,
    meta: EntryMetadata,
}

struct GraphCacheState {
    capacity: usize,
    entries: RecencyList<BufferLayoutKey, CachedGraph>,
    counters: CacheCounters,
}

/// LRU cache of execution graphs for one device context.
///
/// Every operation takes the context's single mutex, so recency order follows
/// the real-time order of lookups across threads. The cache owns every graph
/// handed to [`GraphExecCache::insert`]: handles returned to callers are only
/// borrowed for a launch and are destroyed through the context on eviction or
/// release.
pub struct GraphExecCache {
    context: Arc<dyn DeviceContext>,
    context_id: ContextId,
    state: Mutex<GraphCacheState>,
}

impl GraphExecCache {
    /// Create an empty cache. A capacity of zero is treated as one.
    ///
    /// Capacity is only an upper bound; storage grows with the resident graphs.
    pub fn new(context: Arc<dyn DeviceContext>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let context_id = context.context_id();
        Self {
            context,
            context_id,
            state: Mutex::new(GraphCacheState {
                capacity,
                entries: RecencyList::new(),
                counters: CacheCounters::default(),
            }),
        }
    }

    #[inline]
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn lock(&self) -> MutexGuard<'_, GraphCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find the graph for `key` and mark it most recently used.
    pub fn lookup(&self, key: &BufferLayoutKey) -> Option<GraphExecHandle> {
        let key_hash = key.hash64();
        let (found, resident) = {
            let mut state = self.lock();
            let now = Instant::now();
            let found = state.entries.get_mut(key).map(|entry| {
                entry.meta.touch(now);
                entry.graph
            });
            state.counters.record_lookup(key_hash, found.is_some());
            (found, state.entries.len())
        };

        trace!(context = %self.context_id, key_hash, hit = found.is_some(), "graph cache lookup");
        record_metric_async!(MetricEvent::GraphCacheAccess {
            context_id: self.context_id.0,
            key_hash,
            hit: found.is_some(),
            resident,
        });
        found
    }

    /// Insert `graph` as the most recently used entry and return the handle to launch.
    ///
    /// When the cache grows past its capacity, least recently used entries are
    /// removed and destroyed before this returns. If `key` is already resident,
    /// the resident graph is kept and promoted, and `graph` is destroyed instead.
    pub fn insert(&self, key: BufferLayoutKey, graph: GraphExecHandle) -> GraphExecHandle {
        let key_hash = key.hash64();
        let mut state = self.lock();

        if let Some(resident) = state.entries.get_mut(&key).map(|entry| entry.graph) {
            state.counters.record_insert(key_hash, true);
            if resident != graph {
                let destroyed = self.destroy(graph, key_hash, "duplicate insert");
                state.counters.record_destroy(destroyed);
            }
            debug!(context = %self.context_id, key_hash, "graph already cached, keeping resident entry");
            return resident;
        }

        state.entries.push_front(key, CachedGraph {
            graph,
            meta: EntryMetadata::new(Instant::now()),
        });
        state.counters.record_insert(key_hash, false);

        while state.entries.len() > state.capacity {
            let Some((evicted_key, evicted)) = state.entries.pop_back() else {
                break;
            };
            let evicted_hash = evicted_key.hash64();
            let destroyed = self.destroy(evicted.graph, evicted_hash, "eviction");
            state.counters.record_eviction(evicted_hash, destroyed);
            let resident = state.entries.len();
            debug!(context = %self.context_id, key_hash = evicted_hash, destroyed, resident, "evicted execution graph");
            record_metric_async!(MetricEvent::GraphCacheEviction {
                context_id: self.context_id.0,
                key_hash: evicted_hash,
                destroyed,
                resident,
            });
        }
        graph
    }

    /// Look up `key`, building and inserting a graph on a miss.
    ///
    /// `build` runs without the cache lock held. If another thread inserted the
    /// same key meanwhile, its graph wins and the freshly built one is destroyed.
    pub fn get_or_insert_with<F, E>(&self, key: &BufferLayoutKey, build: F) -> Result<GraphExecHandle, E>
    where
        F: FnOnce(&BufferLayoutKey) -> Result<GraphExecHandle, E>,
    {
        let span = info_span!("graph_cache_get_or_insert", context = %self.context_id);
        let _enter = span.enter();

        if let Some(graph) = self.lookup(key) {
            return Ok(graph);
        }
        let graph = build(key)?;
        Ok(self.insert(key.clone(), graph))
    }

    /// Change the capacity used by future inserts. Existing entries above the
    /// new bound stay until the next insert. Zero is treated as one.
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut state = self.lock();
        debug!(context = %self.context_id, from = state.capacity, to = capacity, "graph cache capacity changed");
        state.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of resident graphs.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is resident, without touching recency or statistics.
    pub fn contains(&self, key: &BufferLayoutKey) -> bool {
        self.lock().entries.contains(key)
    }

    pub fn statistics(&self) -> CacheStatistics {
        let state = self.lock();
        CacheStatistics::from_parts(state.capacity, &state.counters, state.entries.iter().map(|(_, entry)| &entry.meta))
    }

    /// Destroy every resident graph and empty the cache. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let mut state = self.lock();
        let drained = state.entries.drain();
        let released = drained.len();
        for (key, entry) in drained {
            let key_hash = key.hash64();
            let destroyed = self.destroy(entry.graph, key_hash, "release");
            state.counters.record_release(key_hash, destroyed);
        }

        if released > 0 {
            debug!(context = %self.context_id, released, "released graph cache");
        }
        record_metric_async!(MetricEvent::GraphCacheSummary {
            context_id: self.context_id.0,
            lookups: state.counters.lookups(),
            hits: state.counters.hits(),
            misses: state.counters.misses(),
            evictions: state.counters.evictions(),
            released,
        });
        released
    }

    fn destroy(&self, graph: GraphExecHandle, key_hash: u64, reason: &'static str) -> bool {
        match self.context.destroy_graph(graph) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    context = %self.context_id,
                    key_hash,
                    graph = graph.raw(),
                    reason,
                    error = %err,
                    "failed to destroy execution graph; dropping it from the cache anyway"
                );
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.lock();
        state.entries.assert_consistent();
    }

    #[cfg(test)]
    pub(crate) fn keys_most_recent_first(&self) -> Vec<BufferLayoutKey> {
        self.lock().entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

impl Drop for GraphExecCache {
    fn drop(&mut self) {
        let drained = self.state.get_mut().unwrap_or_else(PoisonError::into_inner).entries.drain();
        if drained.is_empty() {
            return;
        }
        let released = drained.len();
        for (key, entry) in drained {
            self.destroy(entry.graph, key.hash64(), "drop");
        }
        debug!(context = %self.context_id, released, "dropped graph cache");
    }
}

impl std::fmt::Debug for GraphExecCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("GraphExecCache")
            .field("context", &self.context_id)
            .field("capacity", &state.capacity)
            .field("resident", &state.entries.len())
            .finish()
    }
}
