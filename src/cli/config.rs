use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use graphtune::GraphCacheConfig;
use tracing::Level;

use super::CliError;

/// Command-line interface configuration for the graphtune CLI
#[derive(Debug, Parser)]
#[command(name = "graphtune")]
#[command(about = "Replay autotuning results and simulate execution graph caches", long_about = None)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format for results written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty, global = true)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pick the fastest algorithm and the fastest one that needs no scratch memory
    Select(SelectArgs),
    /// Pick execution plan indices instead of algorithm descriptors
    Plan(SelectArgs),
    /// Replay a sequence of buffer layouts against in-memory graph caches
    CacheSim(CacheSimArgs),
}

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// JSON file holding candidate results, or `-` for stdin
    #[arg(value_name = "RESULTS")]
    pub input: PathBuf,

    /// Take the first usable candidate instead of the fastest (also enabled by GRAPHTUNE_DETERMINISTIC_OPS)
    #[arg(long)]
    pub deterministic: bool,

    /// Skip emitting the autotune record even when the input describes the operation
    #[arg(long)]
    pub no_log: bool,
}

#[derive(Debug, Args)]
pub struct CacheSimArgs {
    /// Graphs kept per context (defaults to GRAPHTUNE_GRAPH_CACHE_SIZE, then 32)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Number of device contexts; launches are spread over them round-robin
    #[arg(long, default_value_t = 1)]
    pub contexts: u64,

    /// Buffer layout ids to launch, in order
    #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
    pub keys: Vec<u64>,
}

/// Output format options
#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Indented JSON (default)
    Pretty,
    /// One JSON document per line
    Json,
}

impl CliConfig {
    /// Raise `base` according to the `-v` count.
    pub fn log_level(&self, base: Level) -> Level {
        match self.verbose {
            0 => base,
            1 => base.max(Level::DEBUG),
            _ => Level::TRACE,
        }
    }
}

impl CacheSimArgs {
    pub fn cache_config(&self) -> GraphCacheConfig {
        match self.capacity {
            Some(capacity) => GraphCacheConfig::new(capacity),
            None => GraphCacheConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), CliError> {
        if self.contexts == 0 {
            return Err(CliError::config_error("--contexts must be at least 1"));
        }
        Ok(())
    }
}

#[path = "config.test.rs"]
mod tests;
