//! Structured records describing one autotuning pass, and the sink they are handed to.

use graphtune_instrumentation::{MetricEvent, record_metric_async};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CandidateResult;
use crate::device::{ComputeCapability, DeviceContext, DeviceMemory, VersionInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionKind {
    Forward,
    BackwardData,
    BackwardFilter,
    /// Convolution fused with bias add, optional side input and activation.
    ForwardBiasActivation,
}

impl ConvolutionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::BackwardData => "backward_data",
            Self::BackwardFilter => "backward_filter",
            Self::ForwardBiasActivation => "forward_bias_activation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F16,
    Bf16,
    F32,
    F64,
    I8,
    I32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataLayout {
    Nchw,
    Nhwc,
    /// Filter layout: output channels, input channels, spatial.
    Oihw,
    Ohwi,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    #[default]
    None,
    Relu,
    Relu6,
    Sigmoid,
    Tanh,
    Elu,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDescriptor {
    pub dims: Vec<i64>,
    pub layout: DataLayout,
}

impl TensorDescriptor {
    pub fn new(dims: impl Into<Vec<i64>>, layout: DataLayout) -> Self {
        Self { dims: dims.into(), layout }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolutionParams {
    pub padding: Vec<i64>,
    pub strides: Vec<i64>,
    pub dilations: Vec<i64>,
    pub group_count: i64,
}

impl ConvolutionParams {
    /// Unpadded, unit-stride, undilated convolution over `spatial_dims` dimensions.
    pub fn unit(spatial_dims: usize) -> Self {
        Self {
            padding: vec![0; spatial_dims],
            strides: vec![1; spatial_dims],
            dilations: vec![1; spatial_dims],
            group_count: 1,
        }
    }
}

/// Input, filter and output buffers of a convolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvBuffers {
    pub input: DeviceMemory,
    pub filter: DeviceMemory,
    pub output: DeviceMemory,
}

/// The operation being tuned, as it appears in the autotune record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub kind: ConvolutionKind,
    pub element_type: ElementType,
    pub input: TensorDescriptor,
    pub filter: TensorDescriptor,
    pub output: TensorDescriptor,
    pub conv: ConvolutionParams,
    pub conv_scale: f64,
    pub side_value_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationMode>,
    pub input_address: u64,
    pub filter_address: u64,
    pub output_address: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias_address: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_input_address: Option<u64>,
}

impl OperationDescriptor {
    /// Describe a plain convolution. Scales default to `conv_scale = 1`, `side_value_scale = 0`.
    pub fn convolution(
        kind: ConvolutionKind,
        element_type: ElementType,
        input: TensorDescriptor,
        filter: TensorDescriptor,
        output: TensorDescriptor,
        conv: ConvolutionParams,
        buffers: ConvBuffers,
    ) -> Self {
        Self {
            kind,
            element_type,
            input,
            filter,
            output,
            conv,
            conv_scale: 1.0,
            side_value_scale: 0.0,
            activation: None,
            input_address: buffers.input.address,
            filter_address: buffers.filter.address,
            output_address: buffers.output.address,
            bias_address: None,
            side_input_address: None,
        }
    }

    /// Turn a forward convolution description into its fused bias/activation form.
    pub fn fused(
        mut self,
        bias: DeviceMemory,
        side_input: DeviceMemory,
        conv_scale: f64,
        side_value_scale: f64,
        activation: ActivationMode,
    ) -> Self {
        self.kind = ConvolutionKind::ForwardBiasActivation;
        self.conv_scale = conv_scale;
        self.side_value_scale = side_value_scale;
        self.activation = Some(activation);
        self.bias_address = Some(bias.address);
        self.side_input_address = Some(side_input.address);
        self
    }
}

/// Which device the candidates ran on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub dnn_version: VersionInfo,
    pub compute_capability: ComputeCapability,
    pub pci_bus_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blas_version: Option<String>,
}

impl DeviceIdentity {
    /// Query the device. A failed DNN version query is recorded as `0.0.0`.
    pub fn query(device: &dyn DeviceContext) -> Self {
        let dnn_version = device.dnn_version().unwrap_or_else(|err| {
            debug!(error = %err, context = %device.context_id(), "dnn version unavailable");
            VersionInfo::default()
        });
        Self {
            dnn_version,
            compute_capability: device.compute_capability(),
            pci_bus_id: device.pci_bus_id(),
            blas_version: device.blas_version(),
        }
    }
}

/// One autotuning pass: what was tuned, where, and how every candidate did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutotuneLog {
    pub instr: OperationDescriptor,
    pub device: DeviceIdentity,
    pub results: Vec<CandidateResult>,
}

impl AutotuneLog {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_usable()).count()
    }
}

/// Destination for autotune records. Emission cannot fail from the caller's point of view.
pub trait AutotuneSink: Send + Sync {
    fn emit(&self, record: &AutotuneLog);
}

/// Sink that forwards records into the metric pipeline as [`MetricEvent::AutotuneResults`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsSink;

impl AutotuneSink for MetricsSink {
    fn emit(&self, record: &AutotuneLog) {
        debug!(?record, "autotune results");
        let payload = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "dropping autotune record that failed to serialise");
                return;
            }
        };
        record_metric_async!(MetricEvent::AutotuneResults {
            operation: record.instr.kind.as_str().to_string(),
            candidate_count: record.results.len(),
            failed_count: record.failed_count(),
            record: payload,
        });
    }
}

/// Build the record for one autotuning pass and hand it to `sink`.
///
/// Failed candidates are included. Works for both the algorithm and the
/// execution-plan selection paths since they share [`CandidateResult`].
pub fn log_autotune_results(descriptor: &OperationDescriptor, device: &dyn DeviceContext, results: &[CandidateResult], sink: &dyn AutotuneSink) {
    let record = AutotuneLog {
        instr: descriptor.clone(),
        device: DeviceIdentity::query(device),
        results: results.to_vec(),
    };
    sink.emit(&record);
}

#[path = "logger.test.rs"]
mod tests;
