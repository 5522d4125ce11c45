use graphtune_env::{DETERMINISTIC_OPS, DISABLE_REDZONE_CHECK};

/// Switches for one autotuning pass.
///
/// Read once at the call boundary with [`AutotuneOptions::from_env`] and then
/// passed down, so a single pass never observes a half-toggled environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutotuneOptions {
    /// Take the first usable candidate instead of the fastest.
    pub deterministic: bool,
    /// Wrap buffers with guard regions and verify them after each candidate runs.
    pub redzone_check: bool,
}

impl Default for AutotuneOptions {
    fn default() -> Self {
        Self {
            deterministic: false,
            redzone_check: true,
        }
    }
}

impl AutotuneOptions {
    /// Snapshot the environment switches. Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            deterministic: DETERMINISTIC_OPS.read_or(defaults.deterministic),
            redzone_check: !DISABLE_REDZONE_CHECK.read_or(!defaults.redzone_check),
        }
    }

    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn redzone_check(mut self, enabled: bool) -> Self {
        self.redzone_check = enabled;
        self
    }
}
