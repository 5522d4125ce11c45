//! Switches for log verbosity and metric export.

use std::path::PathBuf;

use tracing::Level;

use super::{EnvVar, switch::Switch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentEnvVar {
    /// Default level of the fmt subscriber; `RUST_LOG` still wins.
    LogLevel,
    /// Append every metric record to this file as one JSON line.
    MetricsJsonlPath,
    /// Print a one-line summary of every metric to stderr.
    MetricsConsole,
}

impl InstrumentEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            InstrumentEnvVar::LogLevel => "GRAPHTUNE_LOG_LEVEL",
            InstrumentEnvVar::MetricsJsonlPath => "GRAPHTUNE_METRICS_JSONL_PATH",
            InstrumentEnvVar::MetricsConsole => "GRAPHTUNE_METRICS_CONSOLE",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Instrument(self)
    }
}

pub const LOG_LEVEL: Switch<Level> = Switch::new(InstrumentEnvVar::LogLevel.into_env());
pub const METRICS_JSONL_PATH: Switch<PathBuf> = Switch::new(InstrumentEnvVar::MetricsJsonlPath.into_env());
pub const METRICS_CONSOLE: Switch<bool> = Switch::new(InstrumentEnvVar::MetricsConsole.into_env());
