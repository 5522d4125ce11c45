//! Tracing layer that turns `metrics`-target events back into [`MetricEvent`]s.
//!
//! `record_metric!` carries the event as JSON in a `metric` field. The layer
//! decodes it, stamps it with the time and the enclosing span, and hands the
//! resulting [`MetricRecord`] to every exporter.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{
    Event, Subscriber, field::{Field, Visit}
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::event::MetricEvent;

pub const METRICS_TARGET: &str = "metrics";

/// The span a metric was recorded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanOrigin {
    pub id: u64,
    pub parent: Option<u64>,
    pub name: &'static str,
}

/// A metric event stamped with when and where it was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRecord {
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanOrigin>,
    pub event: MetricEvent,
}

impl MetricRecord {
    /// A record with no span, as produced by the background recorder.
    pub fn now(event: MetricEvent) -> Self {
        Self {
            recorded_at: Utc::now(),
            span: None,
            event,
        }
    }
}

/// Destination for metric records. Called on the thread that recorded the metric,
/// or on the background recorder thread.
pub trait MetricExporter: Send + Sync {
    fn export(&self, record: &MetricRecord);
}

/// Fans metric records out to a fixed set of exporters.
#[derive(Clone)]
pub struct MetricsLayer {
    exporters: Arc<[Box<dyn MetricExporter>]>,
}

impl MetricsLayer {
    pub fn new(exporters: Vec<Box<dyn MetricExporter>>) -> Self {
        Self {
            exporters: exporters.into(),
        }
    }

    pub(crate) fn publish(&self, record: &MetricRecord) {
        self.exporters.iter().for_each(|exporter| exporter.export(record));
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target() != METRICS_TARGET {
            return;
        }
        let mut payload = MetricPayload::default();
        event.record(&mut payload);
        let Some(json) = payload.0 else {
            return;
        };

        match serde_json::from_str::<MetricEvent>(&json) {
            Ok(metric) => {
                let span = ctx.event_span(event).map(|span| SpanOrigin {
                    id: span.id().into_u64(),
                    parent: span.parent().map(|parent| parent.id().into_u64()),
                    name: span.name(),
                });
                self.publish(&MetricRecord {
                    recorded_at: Utc::now(),
                    span,
                    event: metric,
                });
            }
            Err(error) => tracing::warn!(target: "instrument", %error, "dropping malformed metric payload"),
        }
    }
}

#[derive(Default)]
struct MetricPayload(Option<String>);

impl Visit for MetricPayload {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "metric" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}
