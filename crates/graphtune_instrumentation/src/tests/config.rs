use std::path::Path;

use serial_test::serial;

use crate::prelude::*;

#[test]
#[serial]
fn app_config_parses_environment_and_initialises_once() {
    let _log_level = LOG_LEVEL.scoped(&Level::DEBUG);
    let path = std::env::temp_dir().join(format!("graphtune_config_{}.jsonl", std::process::id()));
    let _jsonl_path = METRICS_JSONL_PATH.scoped(&path);
    let _console = METRICS_CONSOLE.scoped(&true);

    let config = AppConfig::from_env().expect("configuration should parse");
    assert_eq!(config.log_level, Level::DEBUG);
    assert_eq!(config.metrics_jsonl_path.as_deref(), Some(path.as_path()));
    assert!(config.console_metrics);
    assert_eq!(config.metric_exporters().expect("exporters should open").len(), 2);

    let installed = config.clone().initialise().expect("first initialise succeeds");
    assert_eq!(installed, &config);
    assert!(matches!(config.initialise(), Err(AppConfigError::AlreadyInitialised)));

    let _ = std::fs::remove_file(&path);
}

#[test]
#[serial]
fn app_config_defaults_when_unset() {
    let _log_level = LOG_LEVEL.scoped_unset();
    let _jsonl_path = METRICS_JSONL_PATH.scoped_unset();
    let _console = METRICS_CONSOLE.scoped_unset();

    let config = AppConfig::from_env().expect("empty environment should parse");
    assert_eq!(config, AppConfig::default());
    assert!(config.metric_exporters().expect("nothing to open").is_empty());
}

#[test]
#[serial]
fn app_config_names_the_offending_variable() {
    let _jsonl_path = METRICS_JSONL_PATH.scoped_unset();
    let _console = METRICS_CONSOLE.scoped_unset();

    {
        let _log_level = LOG_LEVEL.scoped_raw("verbose");
        match AppConfig::from_env() {
            Err(AppConfigError::Env(EnvVarError::Invalid { name, value, .. })) => {
                assert_eq!(name, "GRAPHTUNE_LOG_LEVEL");
                assert_eq!(value, "verbose");
            }
            other => panic!("expected invalid log level, got {other:?}"),
        }
    }

    let _log_level = LOG_LEVEL.scoped_unset();
    let _console = METRICS_CONSOLE.scoped_raw("maybe");
    match AppConfig::from_env() {
        Err(AppConfigError::Env(EnvVarError::Invalid { name, value, .. })) => {
            assert_eq!(name, "GRAPHTUNE_METRICS_CONSOLE");
            assert_eq!(value, "maybe");
        }
        other => panic!("expected invalid console flag, got {other:?}"),
    }
}

#[test]
#[serial]
fn unopenable_metrics_path_is_an_io_error() {
    let config = AppConfig {
        metrics_jsonl_path: Some(Path::new("/nonexistent/graphtune/metrics.jsonl").to_path_buf()),
        ..AppConfig::default()
    };
    assert!(config.metric_exporters().is_err());
}
