//! Canonical metric event definitions emitted by the autotuner and graph cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured, type-safe metric events emitted by the instrumentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MetricEvent {
    /// One autotuning outcome: the operation, the device and every candidate result.
    AutotuneResults {
        /// Operation kind, e.g. `"forward"` or `"fused_forward"`.
        operation: String,
        /// Number of candidates that were benchmarked.
        candidate_count: usize,
        /// Number of candidates carrying a failure.
        failed_count: usize,
        /// Full structured record as produced by the autotune logger.
        record: serde_json::Value,
    },
    /// A kernel wrote outside its allocation and tripped a guard region.
    RedzoneViolation {
        algo_id: i64,
        buffer_address: u64,
        message: String,
    },
    /// Lookup against a per-context execution graph cache.
    GraphCacheAccess {
        context_id: u64,
        key_hash: u64,
        hit: bool,
        resident: usize,
    },
    /// An execution graph left the cache and was handed back to the driver.
    GraphCacheEviction {
        context_id: u64,
        key_hash: u64,
        /// False when the driver reported a failure while destroying the graph.
        destroyed: bool,
        resident: usize,
    },
    /// Lifetime totals for a per-context cache, emitted at teardown.
    GraphCacheSummary {
        context_id: u64,
        lookups: u64,
        hits: u64,
        misses: u64,
        evictions: u64,
        released: usize,
    },
}

impl MetricEvent {
    /// Short stable name of the variant, used by the console exporter and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricEvent::AutotuneResults { .. } => "autotune_results",
            MetricEvent::RedzoneViolation { .. } => "redzone_violation",
            MetricEvent::GraphCacheAccess { .. } => "graph_cache_access",
            MetricEvent::GraphCacheEviction { .. } => "graph_cache_eviction",
            MetricEvent::GraphCacheSummary { .. } => "graph_cache_summary",
        }
    }
}

/// One-line human summary, as printed by the console exporter.
impl fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricEvent::AutotuneResults {
                operation,
                candidate_count,
                failed_count,
                ..
            } => write!(f, "autotune {operation}: {candidate_count} candidates, {failed_count} failed"),
            MetricEvent::RedzoneViolation {
                algo_id,
                buffer_address,
                message,
            } => write!(f, "redzone violation algo={algo_id} buffer={buffer_address:#x}: {message}"),
            MetricEvent::GraphCacheAccess {
                context_id,
                key_hash,
                hit,
                resident,
            } => {
                let outcome = if *hit { "hit" } else { "miss" };
                write!(f, "graph cache ctx={context_id} key={key_hash:016x} {outcome} resident={resident}")
            }
            MetricEvent::GraphCacheEviction {
                context_id,
                key_hash,
                destroyed,
                resident,
            } => write!(
                f,
                "graph cache ctx={context_id} evicted key={key_hash:016x} destroyed={destroyed} resident={resident}"
            ),
            MetricEvent::GraphCacheSummary {
                context_id,
                lookups,
                hits,
                misses,
                evictions,
                released,
            } => write!(
                f,
                "graph cache ctx={context_id} lookups={lookups} hits={hits} misses={misses} evictions={evictions} released={released}"
            ),
        }
    }
}
