use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use newrelic_telemetry_core::types::{attributes, Log, Metric};
use newrelic_telemetry_core::{LogBatch, MetricBatch};

const THREADS: usize = 8;
const RECORDS: usize = 2_000;

#[test]
fn test_counts_survive_concurrent_flushes() {
    let batch = Arc::new(MetricBatch::new());
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let done = Arc::new(AtomicBool::new(false));

    let flusher = {
        let batch = batch.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut total = 0.0;
            while !done.load(Ordering::SeqCst) {
                total += sum_counts(batch.flush().into_metrics());
                thread::yield_now();
            }
            total
        })
    };

    let producers: Vec<_> = (0..THREADS)
        .map(|i| {
            let batch = batch.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..RECORDS {
                    batch
                        .record_count("work", 1.0, attributes! { "worker" => i % 2 })
                        .unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let flushed = flusher.join().unwrap();
    let remaining = sum_counts(batch.flush().into_metrics());
    assert_eq!(flushed + remaining, (THREADS * RECORDS) as f64);
}

#[test]
fn test_no_item_is_duplicated_or_lost() {
    let batch = Arc::new(LogBatch::new());
    let done = Arc::new(AtomicBool::new(false));

    let flusher = {
        let batch = batch.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut seen = Vec::new();
            while !done.load(Ordering::SeqCst) {
                seen.extend(batch.flush().into_items().into_iter().map(|l| l.message));
                thread::yield_now();
            }
            seen
        })
    };

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let batch = batch.clone();
            thread::spawn(move || {
                for i in 0..RECORDS / 4 {
                    batch.record(Log::new(format!("{t}-{i}"))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let mut seen = flusher.join().unwrap();
    seen.extend(batch.flush().into_items().into_iter().map(|l| l.message));

    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), total);
    assert_eq!(total, THREADS * (RECORDS / 4));
}

#[test]
fn test_capacity_under_contention() {
    let batch = Arc::new(LogBatch::with_max_pending(100));
    let producers: Vec<_> = (0..THREADS)
        .map(|_| {
            let batch = batch.clone();
            thread::spawn(move || {
                (0..50)
                    .filter(|i| batch.record(Log::new(i.to_string())).is_ok())
                    .count()
            })
        })
        .collect();
    let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
    assert_eq!(accepted, 100);
    assert_eq!(batch.flush().len(), 100);
}

fn sum_counts(metrics: Vec<Metric>) -> f64 {
    metrics
        .into_iter()
        .map(|metric| match metric {
            Metric::Count(count) => count.value,
            other => panic!("unexpected metric {other:?}"),
        })
        .sum()
}
