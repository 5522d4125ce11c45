//! Convenience re-exports for instrumentation consumers.

pub use crate::async_recorder::{AsyncMetricRecorder, MetricQueue};
pub use crate::config::{AppConfig, AppConfigError};
pub use crate::event::MetricEvent;
pub use crate::exporters::{ConsoleExporter, JsonlExporter};
pub use crate::logging::{DriverLogSeverity, LoggingError, TracingHandle, WarnOnce, init_tracing, log_driver_message};
pub use crate::macros::{SyncMetricScope, init_metric_queue};
pub use crate::recorder::{MetricExporter, MetricRecord, MetricsLayer, SpanOrigin};
pub use crate::{record_metric, record_metric_async};

pub use graphtune_env::{EnvVarError, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};

pub use serde_json;
pub use tracing::{Level, info, info_span, subscriber};
pub use tracing_subscriber::{self, layer::SubscriberExt};
