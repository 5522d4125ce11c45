//! Process environment access shared by the graphtune crates.
//!
//! Writes are serialised through one process-wide mutex: mutating the
//! environment while another thread reads it is undefined behaviour.

pub mod autotune;
pub mod instrument;
pub mod scoped;
pub mod switch;

use std::sync::{Mutex, MutexGuard, PoisonError};

use autotune::AutotuneEnvVar;
use instrument::InstrumentEnvVar;

/// Every variable the graphtune crates read, grouped by consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvVar {
    Instrument(InstrumentEnvVar),
    Autotune(AutotuneEnvVar),
}

impl From<InstrumentEnvVar> for EnvVar {
    fn from(value: InstrumentEnvVar) -> Self {
        Self::Instrument(value)
    }
}

impl From<AutotuneEnvVar> for EnvVar {
    fn from(value: AutotuneEnvVar) -> Self {
        Self::Autotune(value)
    }
}

impl EnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            EnvVar::Instrument(inner) => inner.key(),
            EnvVar::Autotune(inner) => inner.key(),
        }
    }
}

static ENV_WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Serialised access to the process environment.
pub struct Environment;

impl Environment {
    /// Hold the write lock. It guards no data, so poisoning is ignored.
    pub fn lock() -> MutexGuard<'static, ()> {
        ENV_WRITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The raw value, if the variable is set to valid UTF-8.
    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        std::env::var(var.into().key()).ok()
    }

    pub fn is_set(var: impl Into<EnvVar>) -> bool {
        Self::get(var).is_some()
    }

    /// Set `var` to `value`, or remove it when `value` is `None`.
    pub(crate) fn write(var: EnvVar, value: Option<&str>, _held: &MutexGuard<'static, ()>) {
        // SAFETY: `_held` is the environment write lock, so no other graphtune
        // writer runs concurrently.
        unsafe {
            match value {
                Some(value) => std::env::set_var(var.key(), value),
                None => std::env::remove_var(var.key()),
            }
        }
    }
}
