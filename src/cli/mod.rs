//! Command-line front end: argument parsing, errors and the subcommand runners.

pub mod commands;
pub mod config;
pub mod error;

pub use config::CliConfig;
pub use error::CliError;
