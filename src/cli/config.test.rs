#![cfg(test)]

use clap::Parser;

use super::*;

#[test]
fn test_select_parses_input_and_flags() {
    let config = CliConfig::try_parse_from(["graphtune", "select", "results.json", "--deterministic"]).expect("parse");
    match config.command {
        Command::Select(args) => {
            assert_eq!(args.input, PathBuf::from("results.json"));
            assert!(args.deterministic);
            assert!(!args.no_log);
        }
        other => panic!("expected select, got {other:?}"),
    }
    assert_eq!(config.output_format, OutputFormat::Pretty);
}

#[test]
fn test_cache_sim_splits_keys() {
    let config =
        CliConfig::try_parse_from(["graphtune", "cache-sim", "--capacity", "2", "--keys", "1,2,3,1", "--output-format", "json"]).expect("parse");
    match config.command {
        Command::CacheSim(args) => {
            assert_eq!(args.keys, vec![1, 2, 3, 1]);
            assert_eq!(args.cache_config(), GraphCacheConfig::new(2));
            assert_eq!(args.contexts, 1);
        }
        other => panic!("expected cache-sim, got {other:?}"),
    }
    assert_eq!(config.output_format, OutputFormat::Json);
}

#[test]
fn test_cache_sim_requires_keys() {
    assert!(CliConfig::try_parse_from(["graphtune", "cache-sim"]).is_err());
}

#[test]
fn test_zero_contexts_is_rejected() {
    let args = CacheSimArgs {
        capacity: Some(1),
        contexts: 0,
        keys: vec![1],
    };
    assert!(matches!(args.validate(), Err(CliError::ConfigError(_))));
}

#[test]
fn test_verbose_raises_log_level() {
    let config = CliConfig::try_parse_from(["graphtune", "-vv", "plan", "-"]).expect("parse");
    assert_eq!(config.log_level(Level::INFO), Level::TRACE);

    let config = CliConfig::try_parse_from(["graphtune", "plan", "-", "-v"]).expect("parse");
    assert_eq!(config.log_level(Level::INFO), Level::DEBUG);
    assert_eq!(config.log_level(Level::TRACE), Level::TRACE);
}
