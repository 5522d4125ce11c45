//! Temporary environment overrides for tests and tools.

use super::{EnvVar, Environment};

/// Puts a variable back the way it was, set or unset, when dropped.
#[derive(Debug)]
#[must_use = "the override is undone as soon as the guard is dropped"]
pub struct ScopedEnv {
    var: EnvVar,
    restore: Option<String>,
}

impl ScopedEnv {
    /// Set `var` to `value`, or remove it when `value` is `None`, until the guard drops.
    pub fn apply(var: impl Into<EnvVar>, value: Option<&str>) -> Self {
        let var = var.into();
        let held = Environment::lock();
        let restore = Environment::get(var);
        Environment::write(var, value, &held);
        Self { var, restore }
    }

    pub fn var(&self) -> EnvVar {
        self.var
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        let held = Environment::lock();
        Environment::write(self.var, self.restore.as_deref(), &held);
    }
}
