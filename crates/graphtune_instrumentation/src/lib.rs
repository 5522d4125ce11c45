//! Structured logging and metric pipeline for the autotuner and graph cache.

pub mod async_recorder;
pub mod config;
pub mod event;
pub mod exporters;
pub mod logging;
pub mod macros;
pub mod prelude;
pub mod recorder;

pub use async_recorder::{AsyncMetricRecorder, MetricQueue};
pub use event::MetricEvent;
pub use recorder::{MetricExporter, MetricRecord};
pub use logging::{DriverLogSeverity, WarnOnce};
pub use macros::METRIC_QUEUE;

mod tests;
