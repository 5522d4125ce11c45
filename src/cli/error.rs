use std::path::PathBuf;

use graphtune::GraphtuneError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Error when an input file cannot be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when input or output JSON is malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the selection or caching core
    #[error(transparent)]
    Graphtune(#[from] GraphtuneError),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
