//! Environment switches shared by the graphtune crates.

pub mod environment;

pub use environment::{
    EnvVar, Environment, autotune::{AutotuneEnvVar, DETERMINISTIC_OPS, DISABLE_REDZONE_CHECK, GRAPH_CACHE_SIZE}, instrument::{InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH}, scoped::ScopedEnv, switch::{EnvValue, EnvVarError, Switch}
};
