//! Off-thread delivery of metrics recorded with `record_metric_async!`.

use std::{
    io, sync::{
        Arc, atomic::{AtomicBool, Ordering}
    }, thread::{self, JoinHandle}, time::Duration
};

use crossbeam::queue::SegQueue;

use crate::{
    event::MetricEvent, recorder::{MetricExporter, MetricRecord, MetricsLayer}
};

/// Lock-free queue between recording threads and the delivery thread.
pub type MetricQueue = Arc<SegQueue<MetricEvent>>;

const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Owns the thread that drains a [`MetricQueue`] into exporters.
///
/// Dropping the recorder delivers whatever is still queued, then joins the thread.
pub struct AsyncMetricRecorder {
    queue: MetricQueue,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncMetricRecorder {
    pub fn spawn(exporters: Vec<Box<dyn MetricExporter>>) -> io::Result<Self> {
        let layer = MetricsLayer::new(exporters);
        let queue = MetricQueue::default();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let queue = Arc::clone(&queue);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("graphtune-metrics".into())
                .spawn(move || deliver_until_stopped(&queue, &layer, &stop))?
        };

        Ok(Self {
            queue,
            stop,
            worker: Some(worker),
        })
    }

    pub fn queue(&self) -> &MetricQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }
}

fn deliver_until_stopped(queue: &SegQueue<MetricEvent>, layer: &MetricsLayer, stop: &AtomicBool) {
    loop {
        // Read the flag first so everything pushed before shutdown is delivered.
        let stopping = stop.load(Ordering::Acquire);
        while let Some(event) = queue.pop() {
            layer.publish(&MetricRecord::now(event));
        }
        if stopping {
            break;
        }
        thread::park_timeout(IDLE_WAIT);
    }
}

impl Drop for AsyncMetricRecorder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}
