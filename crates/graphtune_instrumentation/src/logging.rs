//! Subscriber setup, once-only warning sites and the driver log bridge.

use std::{
    fmt, str::FromStr, sync::atomic::{AtomicBool, Ordering}
};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::{Directive, LevelFilter, ParseError}, fmt as fmt_layer, layer::SubscriberExt as _, util::{SubscriberInitExt as _, TryInitError}
};

use crate::{AsyncMetricRecorder, config::AppConfig, macros::init_metric_queue};

/// Failures while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to start metric export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log filter directive: {0}")]
    Filter(#[from] ParseError),
    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Keeps the metric pipeline alive; queued metrics are flushed when it drops.
#[must_use = "metric export stops when the handle is dropped"]
pub struct TracingHandle {
    _recorder: Option<AsyncMetricRecorder>,
}

/// Install a fmt subscriber at the configured level and, when exporters are
/// configured, the async metric queue feeding them.
///
/// `RUST_LOG` directives take precedence over `config.log_level`. The `metrics`
/// target is always silenced on the fmt layer since those events are routed to
/// exporters.
pub fn init_tracing(config: &AppConfig) -> Result<TracingHandle, LoggingError> {
    let exporters = config.metric_exporters()?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy()
        .add_directive(Directive::from_str("metrics=off")?);

    tracing_subscriber::registry()
        .with(fmt_layer::layer().with_target(true).with_writer(std::io::stderr).with_filter(filter))
        .try_init()?;

    let recorder = if exporters.is_empty() {
        None
    } else {
        let recorder = AsyncMetricRecorder::spawn(exporters)?;
        if !init_metric_queue(recorder.queue().clone()) {
            tracing::warn!(target: "instrument", "metric queue already installed, keeping the existing one");
        }
        Some(recorder)
    };

    Ok(TracingHandle { _recorder: recorder })
}

/// A process-wide "log this at most once" flag for one warning site.
///
/// Intended to live in a `static` next to the call site. The flag starts clear
/// and is never reset.
#[derive(Debug)]
pub struct WarnOnce {
    fired: AtomicBool,
}

impl WarnOnce {
    pub const fn new() -> Self {
        Self { fired: AtomicBool::new(false) }
    }

    /// Returns true for exactly one caller, however many threads race here.
    pub fn first(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Default for WarnOnce {
    fn default() -> Self {
        Self::new()
    }
}

/// Severity reported by a vendor library through its logging callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverLogSeverity {
    Verbose,
    Info,
    Warning,
    Error,
    InternalError,
}

impl DriverLogSeverity {
    /// Map a raw callback severity, where 0 is the most severe and 4 the least.
    /// Unknown values are treated as internal errors.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::InternalError,
            1 => Self::Error,
            2 => Self::Warning,
            3 => Self::Info,
            4 => Self::Verbose,
            _ => Self::InternalError,
        }
    }
}

impl fmt::Display for DriverLogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::InternalError => "internal_error",
        };
        f.write_str(label)
    }
}

/// Forward a message from a vendor library into tracing.
///
/// Verbose and info messages go to `debug`. Internal errors are logged at `error`
/// with `fatal = true`; aborting is left to the caller.
pub fn log_driver_message(library: &str, severity: DriverLogSeverity, message: &str) {
    match severity {
        DriverLogSeverity::Verbose | DriverLogSeverity::Info => tracing::debug!(target: "driver", library, %severity, "{message}"),
        DriverLogSeverity::Warning => tracing::warn!(target: "driver", library, "{message}"),
        DriverLogSeverity::Error => tracing::error!(target: "driver", library, "{message}"),
        DriverLogSeverity::InternalError => tracing::error!(target: "driver", library, fatal = true, "{message}"),
    }
}
