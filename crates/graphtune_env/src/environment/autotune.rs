//! Switches read by algorithm selection, redzone verification and the graph cache.

use super::{EnvVar, switch::Switch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AutotuneEnvVar {
    /// Skip redzone allocation and verification entirely.
    DisableRedzoneCheck,
    /// Take the first usable candidate instead of the fastest.
    DeterministicOps,
    /// Per-context bound of the execution graph cache.
    GraphCacheSize,
}

impl AutotuneEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            AutotuneEnvVar::DisableRedzoneCheck => "GRAPHTUNE_DISABLE_RZ_CHECK",
            AutotuneEnvVar::DeterministicOps => "GRAPHTUNE_DETERMINISTIC_OPS",
            AutotuneEnvVar::GraphCacheSize => "GRAPHTUNE_GRAPH_CACHE_SIZE",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Autotune(self)
    }
}

pub const DISABLE_REDZONE_CHECK: Switch<bool> = Switch::new(AutotuneEnvVar::DisableRedzoneCheck.into_env());
pub const DETERMINISTIC_OPS: Switch<bool> = Switch::new(AutotuneEnvVar::DeterministicOps.into_env());
pub const GRAPH_CACHE_SIZE: Switch<usize> = Switch::new(AutotuneEnvVar::GraphCacheSize.into_env());
