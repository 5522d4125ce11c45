//! `record_metric!` and `record_metric_async!`, and the process-wide metric queue they feed.

use std::{cell::Cell, marker::PhantomData, sync::OnceLock};

use crate::{MetricQueue, event::MetricEvent};

/// Set once by `init_tracing` when at least one exporter is configured.
pub static METRIC_QUEUE: OnceLock<MetricQueue> = OnceLock::new();

thread_local! {
    static SYNC_SCOPES: Cell<usize> = const { Cell::new(0) };
}

/// While alive, `record_metric_async!` on this thread emits synchronously
/// instead of using the global queue, so a scoped subscriber sees the metric.
#[derive(Debug)]
#[must_use = "metrics go back to the queue when the scope is dropped"]
pub struct SyncMetricScope {
    _not_send: PhantomData<*const ()>,
}

impl SyncMetricScope {
    pub fn enter() -> Self {
        SYNC_SCOPES.with(|depth| depth.set(depth.get() + 1));
        Self { _not_send: PhantomData }
    }
}

impl Drop for SyncMetricScope {
    fn drop(&mut self) {
        SYNC_SCOPES.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn sync_scope_active() -> bool {
    SYNC_SCOPES.with(|depth| depth.get() > 0)
}

/// Emit a [`MetricEvent`] as a `metrics`-target tracing event carrying its JSON form.
#[macro_export]
macro_rules! record_metric {
    ($event:expr) => {
        if let Ok(json) = $crate::prelude::serde_json::to_string(&$event) {
            $crate::prelude::info!(target: "metrics", metric = %json);
        }
    };
}

/// Queue a [`MetricEvent`] for the background recorder, or emit it inline
/// when no queue is installed.
#[macro_export]
macro_rules! record_metric_async {
    ($event:expr) => {
        $crate::macros::enqueue_or_emit($event)
    };
}

#[doc(hidden)]
pub fn enqueue_or_emit(event: MetricEvent) {
    match METRIC_QUEUE.get() {
        Some(queue) if !sync_scope_active() => queue.push(event),
        _ => crate::record_metric!(event),
    }
}

/// Install the global metric queue. Returns false if one is already installed.
pub fn init_metric_queue(queue: MetricQueue) -> bool {
    METRIC_QUEUE.set(queue).is_ok()
}
