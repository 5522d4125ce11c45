#![cfg(test)]

use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::tests::support::MockDevice;

fn constants() -> Vec<ConstantGlobal> {
    vec![
        ConstantGlobal {
            allocation_index: 3,
            symbol: "buffer_for_constant_0".to_string(),
            content: vec![1, 2, 3, 4],
        },
        ConstantGlobal {
            allocation_index: 7,
            symbol: "buffer_for_constant_1".to_string(),
            content: vec![0; 512],
        },
    ]
}

fn executable() -> GpuExecutable {
    GpuExecutable::new("fusion.42", ComputeCapability::new(8, 0))
        .with_constants(constants())
        .with_graph_cache(GraphCacheConfig::new(2))
}

fn layout(base: u64) -> BufferLayoutKey {
    BufferLayoutKey::from_buffers([DeviceMemory::new(base, 128), DeviceMemory::new(base + 0x1000, 128)])
}

#[test]
fn incompatible_device_is_rejected() {
    let exe = executable();
    let device: Arc<dyn DeviceContext> = MockDevice::new(ContextId(1)).with_compute_capability(9, 0).shared();

    match exe.graph_for(&device, &layout(0x1000), |_| Ok(GraphExecHandle::from_raw(1))) {
        Err(GraphtuneError::IncompatibleDevice { expected, actual }) => {
            assert_eq!(expected, ComputeCapability::new(8, 0));
            assert_eq!(actual, ComputeCapability::new(9, 0));
        }
        other => panic!("expected incompatible device error, got {other:?}"),
    }
}

#[test]
fn constants_are_loaded_once_per_context() {
    let exe = executable();
    let first = MockDevice::new(ContextId(1)).shared();
    let second = MockDevice::new(ContextId(2)).shared();
    let first_ctx: Arc<dyn DeviceContext> = first.clone();
    let second_ctx: Arc<dyn DeviceContext> = second.clone();

    let a = exe.resolve_constant_globals(&first_ctx).expect("first load");
    let b = exe.resolve_constant_globals(&first_ctx).expect("cached load");
    let c = exe.resolve_constant_globals(&second_ctx).expect("second context");

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(first.constant_loads(), 1);
    assert_eq!(second.constant_loads(), 1);
    assert_eq!(a.len(), 2);
    assert_eq!(a[&3].size, 4);
    assert_eq!(a[&7].size, 512);
    assert_ne!(a[&3].address, c[&3].address);
}

#[test]
fn constant_load_failure_is_reported_and_retried() {
    let exe = executable();
    let device = MockDevice::new(ContextId(1)).shared();
    let ctx: Arc<dyn DeviceContext> = device.clone();

    device.fail_constant_loads(true);
    assert!(matches!(exe.resolve_constant_globals(&ctx), Err(GraphtuneError::Driver(_))));

    device.fail_constant_loads(false);
    assert!(exe.resolve_constant_globals(&ctx).is_ok());
}

#[test]
fn graph_is_built_once_and_reused() {
    let exe = executable();
    let device: Arc<dyn DeviceContext> = MockDevice::new(ContextId(1)).shared();
    let builds = AtomicU64::new(0);
    let build = |constants: &ConstantBuffers| -> Result<GraphExecHandle, GraphtuneError> {
        assert_eq!(constants.len(), 2);
        Ok(GraphExecHandle::from_raw(100 + builds.fetch_add(1, Ordering::SeqCst)))
    };

    let first = exe.graph_for(&device, &layout(0x1000), build).expect("first launch");
    let second = exe.graph_for(&device, &layout(0x1000), build).expect("second launch");

    assert_eq!(first, GraphLaunch::Graph(GraphExecHandle::from_raw(100)));
    assert_eq!(second, first);
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let stats = exe.graph_cache_statistics();
    assert_eq!(stats[&ContextId(1)].hits, 1);
    assert_eq!(stats[&ContextId(1)].misses, 1);
}

#[test]
fn build_failure_leaves_cache_empty() {
    let exe = executable();
    let device: Arc<dyn DeviceContext> = MockDevice::new(ContextId(1)).shared();

    let result = exe.graph_for(&device, &layout(0x1000), |_| Err(DriverError::call("graphInstantiate", "out of memory").into()));
    assert!(matches!(result, Err(GraphtuneError::Driver(_))));
    assert_eq!(exe.graph_cache_len(ContextId(1)), 0);
}

#[test]
fn uncapturable_program_runs_eagerly() {
    let exe = executable().with_graph_capture(false);
    let device: Arc<dyn DeviceContext> = MockDevice::new(ContextId(1)).shared();

    let launch = exe
        .graph_for(&device, &layout(0x1000), |_| panic!("graph must not be built"))
        .expect("eager launch");
    assert_eq!(launch, GraphLaunch::Eager);
    assert_eq!(exe.graph_cache_len(ContextId(1)), 0);
}

#[test]
fn release_and_drop_destroy_cached_graphs() {
    let device = MockDevice::new(ContextId(4)).shared();
    let ctx: Arc<dyn DeviceContext> = device.clone();

    let exe = executable();
    exe.graph_for(&ctx, &layout(0x1000), |_| Ok(GraphExecHandle::from_raw(1))).expect("launch");
    assert_eq!(exe.release(), 1);
    assert_eq!(device.destroyed(), vec![GraphExecHandle::from_raw(1)]);

    exe.graph_for(&ctx, &layout(0x2000), |_| Ok(GraphExecHandle::from_raw(2))).expect("launch");
    drop(exe);
    assert_eq!(device.destroyed(), vec![GraphExecHandle::from_raw(1), GraphExecHandle::from_raw(2)]);
}

#[test]
fn capacity_change_reaches_executable_caches() {
    let device = MockDevice::new(ContextId(1)).shared();
    let ctx: Arc<dyn DeviceContext> = device.clone();
    let exe = executable();

    for n in 0..2 {
        exe.graph_for(&ctx, &layout(0x1000 * (n + 1)), |_| Ok(GraphExecHandle::from_raw(n))).expect("launch");
    }
    exe.set_graph_cache_capacity(1);
    assert_eq!(exe.graph_cache_len(ContextId(1)), 2);

    exe.graph_for(&ctx, &layout(0x9000), |_| Ok(GraphExecHandle::from_raw(9))).expect("launch");
    assert_eq!(exe.graph_cache_len(ContextId(1)), 1);
    assert_eq!(device.destroyed().len(), 2);
}
