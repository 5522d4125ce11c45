mod cli;

use anyhow::Result;
use clap::Parser;
use graphtune_instrumentation::prelude::{AppConfig, init_tracing};

use crate::cli::{CliConfig, commands};

fn main() -> Result<()> {
    let cli = CliConfig::parse();

    let mut config = AppConfig::from_env()?;
    config.log_level = cli.log_level(config.log_level);
    let config = AppConfig::initialise(config)?;
    let _tracing = init_tracing(config)?;

    commands::run(&cli.command, cli.output_format)?;
    Ok(())
}
