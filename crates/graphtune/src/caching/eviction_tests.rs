use std::{
    sync::{
        Arc, Barrier, atomic::{AtomicU64, Ordering}, mpsc
    }, thread
};

use graphtune_instrumentation::{
    MetricEvent, prelude::{MetricExporter, MetricRecord, MetricsLayer, SubscriberExt as _, SyncMetricScope}
};
use tracing::Level;

use super::*;
use crate::{
    device::{ContextId, DeviceMemory, GraphExecHandle}, tests::support::{CapturedEvents, MockDevice}
};

fn key(n: u64) -> BufferLayoutKey {
    BufferLayoutKey::from_buffers([DeviceMemory::new(0x1000 * n, 64), DeviceMemory::new(0x9000_0000 + n, 16)])
}

fn graph(n: u64) -> GraphExecHandle {
    GraphExecHandle::from_raw(0xa000 + n)
}

#[test]
fn least_recently_used_entry_is_evicted_and_destroyed() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 2);

    cache.insert(key(1), graph(1));
    cache.insert(key(2), graph(2));
    cache.insert(key(3), graph(3));

    assert_eq!(cache.len(), 2);
    assert_eq!(device.destroyed(), vec![graph(1)]);
    assert_eq!(cache.lookup(&key(1)), None);
    assert_eq!(cache.lookup(&key(2)), Some(graph(2)));
    assert_eq!(cache.lookup(&key(3)), Some(graph(3)));
    cache.assert_consistent();
}

#[test]
fn lookup_protects_an_entry_from_eviction() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 2);

    cache.insert(key(1), graph(1));
    cache.insert(key(2), graph(2));
    assert_eq!(cache.lookup(&key(1)), Some(graph(1)));
    cache.insert(key(3), graph(3));

    assert_eq!(device.destroyed(), vec![graph(2)]);
    assert_eq!(cache.keys_most_recent_first(), vec![key(3), key(1)]);
}

#[test]
fn capacity_one_keeps_only_the_newest_graph() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 1);

    assert_eq!(cache.insert(key(1), graph(1)), graph(1));
    assert_eq!(cache.insert(key(2), graph(2)), graph(2));

    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&key(2)));
    assert_eq!(device.destroyed(), vec![graph(1)]);
}

#[test]
fn zero_capacity_is_treated_as_one() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 0);
    assert_eq!(cache.capacity(), 1);

    cache.insert(key(1), graph(1));
    assert_eq!(cache.lookup(&key(1)), Some(graph(1)));

    cache.set_capacity(0);
    assert_eq!(cache.capacity(), 1);
}

#[test]
fn huge_capacity_does_not_reserve_storage_up_front() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 1usize << 40);
    assert_eq!(cache.capacity(), 1 << 40);

    for n in 1..=3 {
        cache.insert(key(n), graph(n));
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.lookup(&key(2)), Some(graph(2)));
    assert!(device.destroyed().is_empty());
    cache.assert_consistent();
}

#[test]
fn dropping_a_standalone_cache_destroys_resident_graphs() {
    let device = MockDevice::new(ContextId(3)).shared();
    let cache = GraphExecCache::new(device.clone(), 4);
    cache.insert(key(1), graph(1));
    cache.insert(key(2), graph(2));

    drop(cache);
    let mut destroyed = device.destroyed();
    destroyed.sort_by_key(|g| g.raw());
    assert_eq!(destroyed, vec![graph(1), graph(2)]);
}

#[test]
fn cache_handle_outliving_its_registry_destroys_each_graph_once() {
    let device = MockDevice::new(ContextId(4)).shared();
    let context: Arc<dyn crate::device::DeviceContext> = device.clone();

    let registry = GraphCacheRegistry::new(GraphCacheConfig::new(4));
    let cache = registry.cache_for(&context);
    cache.insert(key(1), graph(1));
    drop(registry);
    assert_eq!(device.destroyed(), vec![graph(1)]);

    cache.insert(key(2), graph(2));
    drop(cache);
    assert_eq!(device.destroyed(), vec![graph(1), graph(2)]);
}

#[test]
fn shrinking_capacity_waits_for_the_next_insert() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 3);
    for n in 1..=3 {
        cache.insert(key(n), graph(n));
    }

    cache.set_capacity(1);
    assert_eq!(cache.len(), 3);
    assert!(device.destroyed().is_empty());

    cache.insert(key(4), graph(4));
    assert_eq!(cache.len(), 1);
    assert_eq!(device.destroyed(), vec![graph(1), graph(2), graph(3)]);
    assert_eq!(cache.lookup(&key(4)), Some(graph(4)));
}

#[test]
fn duplicate_insert_keeps_resident_graph() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 2);

    cache.insert(key(1), graph(1));
    cache.insert(key(2), graph(2));
    let kept = cache.insert(key(1), graph(9));

    assert_eq!(kept, graph(1));
    assert_eq!(cache.len(), 2);
    assert_eq!(device.destroyed(), vec![graph(9)]);
    assert_eq!(cache.keys_most_recent_first(), vec![key(1), key(2)]);

    let stats = cache.statistics();
    assert_eq!(stats.insertions, 2);
    assert_eq!(stats.last_event.map(|e| e.kind), Some(CacheEventKind::DuplicateInsert));

    // Re-offering the resident handle itself must not destroy it.
    cache.insert(key(1), graph(1));
    assert_eq!(device.destroyed(), vec![graph(9)]);
}

#[test]
fn failed_destroy_is_logged_and_entry_still_removed() {
    let captured = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());
    let device = MockDevice::new(ContextId(3)).shared();
    device.fail_destroys(true);
    let cache = GraphExecCache::new(device.clone(), 1);

    tracing::subscriber::with_default(subscriber, || {
        cache.insert(key(1), graph(1));
        cache.insert(key(2), graph(2));
    });

    assert_eq!(cache.len(), 1);
    assert!(!cache.contains(&key(1)));
    assert_eq!(device.destroyed(), vec![graph(1)]);

    let stats = cache.statistics();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.destroy_failures, 1);
    assert_eq!(captured.count_at(Level::ERROR), 1);
    assert!(captured.messages_at(Level::ERROR)[0].contains("failed to destroy execution graph"));
}

#[test]
fn release_all_destroys_every_graph_once() {
    let device = MockDevice::new(ContextId(1)).shared();
    let cache = GraphExecCache::new(device.clone(), 4);
    for n in 1..=3 {
        cache.insert(key(n), graph(n));
    }
    cache.lookup(&key(1));

    assert_eq!(cache.release_all(), 3);
    assert!(cache.is_empty());
    let mut destroyed = device.destroyed();
    destroyed.sort_by_key(|g| g.raw());
    assert_eq!(destroyed, vec![graph(1), graph(2), graph(3)]);

    assert_eq!(cache.release_all(), 0);
    assert_eq!(device.destroyed().len(), 3);
}

#[test]
fn statistics_track_hits_misses_and_last_key() {
    let device = MockDevice::new(ContextId(2)).shared();
    let cache = GraphExecCache::new(device, 4);

    assert_eq!(cache.lookup(&key(1)), None);
    cache.insert(key(1), graph(1));
    cache.lookup(&key(1));
    cache.lookup(&key(1));
    cache.lookup(&key(1));

    let stats = cache.statistics();
    assert_eq!(stats.lookups, 4);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.last_key_hash, Some(key(1).hash64()));
    assert_eq!(stats.last_key_hits, 3);
    assert_eq!(stats.resident, 1);
    assert_eq!(stats.max_entry_reuse_count, Some(3));
    assert_eq!(stats.hit_rate(), Some(0.75));

    cache.lookup(&key(2));
    let stats = cache.statistics();
    assert_eq!(stats.last_key_hash, Some(key(2).hash64()));
    assert_eq!(stats.last_key_hits, 0);
}

#[test]
fn concurrent_use_respects_capacity_and_owns_every_graph() {
    const THREADS: u64 = 8;
    const ROUNDS: u64 = 200;
    const CAPACITY: usize = 4;

    let device = MockDevice::new(ContextId(7)).shared();
    let cache = Arc::new(GraphExecCache::new(device.clone(), CAPACITY));
    let next_handle = Arc::new(AtomicU64::new(1));
    let offered = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let next_handle = Arc::clone(&next_handle);
            let offered = Arc::clone(&offered);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let k = key((t * 7 + round) % 12);
                    if cache.lookup(&k).is_none() {
                        let handle = GraphExecHandle::from_raw(next_handle.fetch_add(1, Ordering::SeqCst));
                        offered.fetch_add(1, Ordering::SeqCst);
                        cache.insert(k, handle);
                    }
                    assert!(cache.len() <= CAPACITY);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    cache.assert_consistent();
    assert!(cache.len() <= CAPACITY);

    let destroyed = device.destroyed();
    let mut unique = destroyed.clone();
    unique.sort_by_key(|g| g.raw());
    unique.dedup();
    assert_eq!(unique.len(), destroyed.len(), "a graph was destroyed twice");
    assert_eq!(destroyed.len() as u64 + cache.len() as u64, offered.load(Ordering::SeqCst));

    let stats = cache.statistics();
    assert_eq!(stats.lookups, THREADS * ROUNDS);
    assert_eq!(stats.hits + stats.misses, stats.lookups);
}

#[test]
fn eviction_emits_graph_cache_metric() {
    let (sender, receiver) = mpsc::channel::<MetricRecord>();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(sender)];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));
    let device = MockDevice::new(ContextId(11)).shared();
    let cache = GraphExecCache::new(device, 1);

    tracing::subscriber::with_default(subscriber, || {
        let _sync = SyncMetricScope::enter();
        cache.insert(key(1), graph(1));
        cache.insert(key(2), graph(2));
    });

    let eviction = receiver
        .try_iter()
        .map(|record| record.event)
        .find(|event| matches!(event, MetricEvent::GraphCacheEviction { .. }));
    match eviction {
        Some(MetricEvent::GraphCacheEviction {
            context_id,
            key_hash,
            destroyed,
            resident,
        }) => {
            assert_eq!(context_id, 11);
            assert_eq!(key_hash, key(1).hash64());
            assert!(destroyed);
            assert_eq!(resident, 1);
        }
        other => panic!("expected eviction metric, got {other:?}"),
    }
}

#[test]
fn registry_isolates_contexts_and_releases_on_drop() {
    let first = MockDevice::new(ContextId(1)).shared();
    let second = MockDevice::new(ContextId(2)).shared();
    let first_ctx: Arc<dyn crate::device::DeviceContext> = first.clone();
    let second_ctx: Arc<dyn crate::device::DeviceContext> = second.clone();

    let registry = GraphCacheRegistry::new(GraphCacheConfig::new(2));
    registry.insert(&first_ctx, key(1), graph(1));
    registry.insert(&second_ctx, key(1), graph(2));

    assert_eq!(registry.lookup(&first_ctx, &key(1)), Some(graph(1)));
    assert_eq!(registry.lookup(&second_ctx, &key(1)), Some(graph(2)));
    assert_eq!(registry.len(ContextId(1)), 1);
    assert_eq!(registry.len(ContextId(99)), 0);
    assert_eq!(registry.context_count(), 2);

    let stats = registry.statistics();
    assert_eq!(stats[&ContextId(1)].hits, 1);
    assert_eq!(stats[&ContextId(2)].hits, 1);

    drop(registry);
    assert_eq!(first.destroyed(), vec![graph(1)]);
    assert_eq!(second.destroyed(), vec![graph(2)]);
}

#[test]
fn registry_capacity_applies_to_existing_and_future_caches() {
    let first: Arc<dyn crate::device::DeviceContext> = MockDevice::new(ContextId(1)).shared();
    let second: Arc<dyn crate::device::DeviceContext> = MockDevice::new(ContextId(2)).shared();

    let registry = GraphCacheRegistry::new(GraphCacheConfig::new(8));
    let existing = registry.cache_for(&first);
    registry.set_capacity(3);

    assert_eq!(existing.capacity(), 3);
    assert_eq!(registry.cache_for(&second).capacity(), 3);
    assert!(Arc::ptr_eq(&existing, &registry.cache_for(&first)));
}
