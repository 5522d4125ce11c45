use std::sync::{Arc, Barrier, atomic::{AtomicUsize, Ordering}};
use std::thread;

use crate::prelude::*;

#[test]
fn warn_once_admits_a_single_racing_thread() {
    static SITE: WarnOnce = WarnOnce::new();
    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let winners = Arc::clone(&winners);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if SITE.first() {
                    winners.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread should not panic");
    }

    assert_eq!(winners.load(Ordering::Relaxed), 1);
    assert!(SITE.has_fired());
    assert!(!SITE.first());
}

#[test]
fn driver_severity_maps_raw_levels() {
    assert_eq!(DriverLogSeverity::from_raw(0), DriverLogSeverity::InternalError);
    assert_eq!(DriverLogSeverity::from_raw(2), DriverLogSeverity::Warning);
    assert_eq!(DriverLogSeverity::from_raw(4), DriverLogSeverity::Verbose);
    assert_eq!(DriverLogSeverity::from_raw(17), DriverLogSeverity::InternalError);
    assert_eq!(DriverLogSeverity::InternalError.to_string(), "internal_error");
}

#[test]
fn driver_messages_never_reach_metric_exporters() {
    let (sender, receiver) = std::sync::mpsc::channel::<MetricRecord>();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(sender)];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        for raw in 0..5 {
            log_driver_message("dnn", DriverLogSeverity::from_raw(raw), "engine build finished");
        }
    });

    assert!(receiver.try_recv().is_err());
}
