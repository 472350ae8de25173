use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ingest,
    Consolidate,
    Communities,
    Reports,
    GlobalQuery,
    LocalQuery,
    Admin,
}

impl Operation {
    const ALL: [Operation; 7] = [
        Operation::Ingest,
        Operation::Consolidate,
        Operation::Communities,
        Operation::Reports,
        Operation::GlobalQuery,
        Operation::LocalQuery,
        Operation::Admin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Ingest => "ingest",
            Operation::Consolidate => "consolidate",
            Operation::Communities => "communities",
            Operation::Reports => "reports",
            Operation::GlobalQuery => "query_global",
            Operation::LocalQuery => "query_local",
            Operation::Admin => "admin",
        }
    }
}

#[derive(Default)]
struct Timing {
    count: AtomicU64,
    total_us: AtomicU64,
}

#[derive(Default)]
pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing per operation, indexed by discriminant
    timings: [Timing; 7],

    // Pipeline volume
    chunks_processed: AtomicUsize,
    chunks_failed: AtomicUsize,
    entities_extracted: AtomicUsize,
    reports_generated: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn timing(&self, operation: Operation) -> &Timing {
        &self.timings[operation as usize]
    }

    pub fn record_request(&self, operation: Operation, duration: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let timing = self.timing(operation);
        timing.count.fetch_add(1, Ordering::Relaxed);
        timing
            .total_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_ingest(&self, succeeded: usize, failed: usize, entities: usize) {
        self.chunks_processed.fetch_add(succeeded, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed, Ordering::Relaxed);
        self.entities_extracted.fetch_add(entities, Ordering::Relaxed);
    }

    pub fn record_reports(&self, generated: usize) {
        self.reports_generated.fetch_add(generated, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = Operation::ALL
            .iter()
            .map(|&op| {
                let timing = self.timing(op);
                let count = timing.count.load(Ordering::Relaxed);
                let total_us = timing.total_us.load(Ordering::Relaxed);
                let avg_ms = if count > 0 {
                    total_us as f64 / count as f64 / 1000.0
                } else {
                    0.0
                };
                (op.name(), OperationTiming { count, avg_ms })
            })
            .collect();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            operations,
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            entities_extracted: self.entities_extracted.load(Ordering::Relaxed),
            reports_generated: self.reports_generated.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationTiming {
    pub count: u64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub operations: BTreeMap<&'static str, OperationTiming>,
    pub chunks_processed: usize,
    pub chunks_failed: usize,
    pub entities_extracted: usize,
    pub reports_generated: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_are_per_operation() {
        let metrics = Metrics::new();
        metrics.record_request(Operation::GlobalQuery, Duration::from_millis(10), true);
        metrics.record_request(Operation::GlobalQuery, Duration::from_millis(30), false);
        metrics.record_request(Operation::Ingest, Duration::from_millis(5), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(
            snapshot.operations["query_global"],
            OperationTiming {
                count: 2,
                avg_ms: 20.0
            }
        );
        assert_eq!(snapshot.operations["ingest"].count, 1);
        assert_eq!(snapshot.operations["reports"].avg_ms, 0.0);
    }

    #[test]
    fn pipeline_volume_accumulates() {
        let metrics = Metrics::new();
        metrics.record_ingest(3, 1, 12);
        metrics.record_ingest(2, 0, 4);
        metrics.record_reports(5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chunks_processed, 5);
        assert_eq!(snapshot.chunks_failed, 1);
        assert_eq!(snapshot.entities_extracted, 16);
        assert_eq!(snapshot.reports_generated, 5);
    }
}
