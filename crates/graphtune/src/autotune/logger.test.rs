#![cfg(test)]

use std::{sync::mpsc, time::Duration};

use graphtune_instrumentation::prelude::{MetricExporter, MetricRecord, MetricsLayer, SubscriberExt as _, SyncMetricScope};

use super::*;
use crate::{
    autotune::{AlgorithmDesc, FailureKind}, device::ContextId, tests::support::{CollectingSink, MockDevice}
};

fn descriptor() -> OperationDescriptor {
    OperationDescriptor::convolution(
        ConvolutionKind::Forward,
        ElementType::F16,
        TensorDescriptor::new([8, 64, 56, 56], DataLayout::Nchw),
        TensorDescriptor::new([128, 64, 3, 3], DataLayout::Oihw),
        TensorDescriptor::new([8, 128, 56, 56], DataLayout::Nchw),
        ConvolutionParams {
            padding: vec![1, 1],
            ..ConvolutionParams::unit(2)
        },
        ConvBuffers {
            input: DeviceMemory::new(0x1000, 64),
            filter: DeviceMemory::new(0x2000, 64),
            output: DeviceMemory::new(0x3000, 64),
        },
    )
}

fn results() -> Vec<CandidateResult> {
    vec![
        CandidateResult::succeeded(AlgorithmDesc::new(0, false), Duration::from_micros(900), 0),
        CandidateResult::failed(AlgorithmDesc::new(1, true), FailureKind::RedzoneModified, "guard clobbered"),
    ]
}

#[test]
fn record_contains_descriptor_device_and_all_results() {
    let device = MockDevice::new(ContextId(4)).with_blas_version("12.1.3");
    let sink = CollectingSink::default();

    log_autotune_results(&descriptor(), &device, &results(), &sink);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.instr.kind, ConvolutionKind::Forward);
    assert_eq!(record.instr.conv_scale, 1.0);
    assert_eq!(record.instr.side_value_scale, 0.0);
    assert_eq!(record.instr.input_address, 0x1000);
    assert!(record.instr.bias_address.is_none());
    assert_eq!(record.device.dnn_version, VersionInfo::new(9, 1, 0));
    assert_eq!(record.device.compute_capability, ComputeCapability::new(8, 0));
    assert_eq!(record.device.pci_bus_id, "0000:00:04.0");
    assert_eq!(record.device.blas_version.as_deref(), Some("12.1.3"));
    assert_eq!(record.results, results());
    assert_eq!(record.failed_count(), 1);
}

#[test]
fn unavailable_versions_are_defaulted_or_omitted() {
    let device = MockDevice::new(ContextId(5)).without_dnn();
    let sink = CollectingSink::default();

    log_autotune_results(&descriptor(), &device, &[], &sink);

    let record = &sink.records()[0];
    assert_eq!(record.device.dnn_version, VersionInfo::default());
    assert!(record.device.blas_version.is_none());
    let json = serde_json::to_value(record).expect("record serialises");
    assert!(json["device"].get("blas_version").is_none());
}

#[test]
fn fused_descriptor_carries_bias_side_input_and_scales() {
    let fused = descriptor().fused(
        DeviceMemory::new(0x4000, 16),
        DeviceMemory::new(0x5000, 16),
        0.5,
        2.0,
        ActivationMode::Relu,
    );
    assert_eq!(fused.kind, ConvolutionKind::ForwardBiasActivation);
    assert_eq!(fused.bias_address, Some(0x4000));
    assert_eq!(fused.side_input_address, Some(0x5000));
    assert_eq!(fused.conv_scale, 0.5);
    assert_eq!(fused.side_value_scale, 2.0);
    assert_eq!(fused.activation, Some(ActivationMode::Relu));

    let json = serde_json::to_value(&fused).expect("descriptor serialises");
    assert_eq!(json["kind"], "forward_bias_activation");
    assert_eq!(json["activation"], "relu");
}

#[test]
fn metrics_sink_emits_autotune_metric() {
    let (sender, receiver) = mpsc::channel::<MetricRecord>();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(sender)];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));
    let device = MockDevice::new(ContextId(6));

    tracing::subscriber::with_default(subscriber, || {
        let _sync = SyncMetricScope::enter();
        log_autotune_results(&descriptor(), &device, &results(), &MetricsSink);
    });

    let record = receiver.recv_timeout(Duration::from_secs(1)).expect("metric should be dispatched");
    match record.event {
        MetricEvent::AutotuneResults {
            operation,
            candidate_count,
            failed_count,
            record,
        } => {
            assert_eq!(operation, "forward");
            assert_eq!(candidate_count, 2);
            assert_eq!(failed_count, 1);
            assert_eq!(record["results"][1]["failure"]["kind"], "REDZONE_MODIFIED");
            assert_eq!(record["device"]["pci_bus_id"], "0000:00:06.0");
        }
        other => panic!("expected autotune metric, got {other:?}"),
    }
}
