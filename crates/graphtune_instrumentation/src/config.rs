//! Process-wide logging and metrics settings.

use std::{io, path::PathBuf, sync::OnceLock};

use graphtune_env::{EnvVarError, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};
use tracing::Level;

use crate::{
    exporters::{ConsoleExporter, JsonlExporter}, recorder::MetricExporter
};

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("app configuration already initialised")]
    AlreadyInitialised,
    #[error(transparent)]
    Env(#[from] EnvVarError),
}

/// Log level and metric outputs for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: Level,
    /// Append metric records here as JSON lines.
    pub metrics_jsonl_path: Option<PathBuf>,
    /// Print metric summaries to stderr.
    pub console_metrics: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            metrics_jsonl_path: None,
            console_metrics: false,
        }
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

impl AppConfig {
    /// Unset variables keep their defaults; a variable set to an unusable value is an error.
    pub fn from_env() -> Result<Self, AppConfigError> {
        let defaults = Self::default();
        Ok(Self {
            log_level: LOG_LEVEL.read()?.unwrap_or(defaults.log_level),
            metrics_jsonl_path: METRICS_JSONL_PATH.read()?,
            console_metrics: METRICS_CONSOLE.read()?.unwrap_or(defaults.console_metrics),
        })
    }

    /// Exporters for the configured outputs; empty when metrics are off.
    pub fn metric_exporters(&self) -> io::Result<Vec<Box<dyn MetricExporter>>> {
        let mut exporters: Vec<Box<dyn MetricExporter>> = Vec::new();
        if let Some(path) = &self.metrics_jsonl_path {
            exporters.push(Box::new(JsonlExporter::create(path)?));
        }
        if self.console_metrics {
            exporters.push(Box::new(ConsoleExporter));
        }
        Ok(exporters)
    }

    /// Install `self` as the process configuration. Only the first call succeeds.
    pub fn initialise(self) -> Result<&'static Self, AppConfigError> {
        let mut pending = Some(self);
        let installed = APP_CONFIG.get_or_init(|| pending.take().unwrap_or_default());
        match pending {
            None => Ok(installed),
            Some(_) => Err(AppConfigError::AlreadyInitialised),
        }
    }
}
