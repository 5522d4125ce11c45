//! Execution graph caching.
//!
//! A compiled graph is only valid for the exact buffer addresses it was
//! captured with, so graphs are cached per device context and keyed by
//! [`BufferLayoutKey`]. Each [`GraphExecCache`] is a bounded LRU guarded by a
//! single mutex. The [`GraphCacheRegistry`] hands out one cache per context
//! and tears all of them down when its owner goes away.

mod graph_cache;
mod layout_key;
mod lru;
mod metrics;
mod registry;

#[cfg(test)]
#[path = "eviction_tests.rs"]
mod eviction_tests;

use graphtune_env::GRAPH_CACHE_SIZE;
pub use graph_cache::GraphExecCache;
pub use layout_key::{BufferLayoutKey, BufferSlice};
pub use metrics::{CacheEvent, CacheEventKind, CacheStatistics};
pub use registry::GraphCacheRegistry;

/// Capacity used when nothing else is configured.
pub const DEFAULT_GRAPH_CACHE_CAPACITY: usize = 32;

/// Sizing for the per-context graph caches created by a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphCacheConfig {
    pub capacity: usize,
}

impl Default for GraphCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_GRAPH_CACHE_CAPACITY,
        }
    }
}

impl GraphCacheConfig {
    /// Capacity is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    /// Read `GRAPHTUNE_GRAPH_CACHE_SIZE`, falling back to the default when unset or invalid.
    pub fn from_env() -> Self {
        Self::new(GRAPH_CACHE_SIZE.read_or(DEFAULT_GRAPH_CACHE_CAPACITY))
    }
}
