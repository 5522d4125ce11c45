//! Measures lookup and insert/evict throughput of a per-context graph cache.

use std::{hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use graphtune::{
    BufferLayoutKey, ComputeCapability, ContextId, DeviceContext, DeviceMemory, DriverError, GraphExecCache, GraphExecHandle, VersionInfo
};

struct NullContext;

impl DeviceContext for NullContext {
    fn context_id(&self) -> ContextId {
        ContextId(0)
    }

    fn dnn_version(&self) -> Result<VersionInfo, DriverError> {
        Ok(VersionInfo::default())
    }

    fn compute_capability(&self) -> ComputeCapability {
        ComputeCapability::default()
    }

    fn pci_bus_id(&self) -> String {
        String::new()
    }

    fn destroy_graph(&self, _graph: GraphExecHandle) -> Result<(), DriverError> {
        Ok(())
    }
}

fn layout(id: u64, buffers: u64) -> BufferLayoutKey {
    BufferLayoutKey::from_buffers((0..buffers).map(|b| DeviceMemory::new(0x1000_0000 + id * 0x10_0000 + b * 0x1000, 0x1000)))
}

fn benchmark_lookup_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_cache_lookup_hit");
    for capacity in [8usize, 64, 512] {
        let cache = GraphExecCache::new(Arc::new(NullContext), capacity);
        let keys: Vec<_> = (0..capacity as u64).map(|id| layout(id, 6)).collect();
        for (n, key) in keys.iter().enumerate() {
            cache.insert(key.clone(), GraphExecHandle::from_raw(n as u64));
        }

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &keys, |b, keys| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % keys.len();
                black_box(cache.lookup(&keys[i]))
            });
        });
    }
    group.finish();
}

fn benchmark_insert_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_cache_insert_evict");
    for capacity in [8usize, 64] {
        let cache = GraphExecCache::new(Arc::new(NullContext), capacity);
        let keys: Vec<_> = (0..(capacity as u64 * 4)).map(|id| layout(id, 6)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &keys, |b, keys| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let key = &keys[(i % keys.len() as u64) as usize];
                if cache.lookup(key).is_none() {
                    black_box(cache.insert(key.clone(), GraphExecHandle::from_raw(i)));
                }
            });
        });
    }
    group.finish();
}

fn benchmark_key_hash(c: &mut Criterion) {
    let key = layout(3, 16);
    c.bench_function("buffer_layout_key_hash64", |b| b.iter(|| black_box(&key).hash64()));
}

criterion_group!(benches, benchmark_lookup_hit, benchmark_insert_with_eviction, benchmark_key_hash);
criterion_main!(benches);
