use std::sync::atomic::{AtomicU64, Ordering};

use crate::extraction::ExtractionReport;

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    records_extracted: AtomicU64,
    records_failed: AtomicU64,
    posts_generated: AtomicU64,
    generation_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one extraction run into the counters.
    pub fn record_extraction(&self, report: &ExtractionReport) {
        self.records_extracted
            .fetch_add(report.succeeded as u64, Ordering::Relaxed);
        self.records_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    /// Record the outcome of one generation request.
    pub fn record_generation(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.posts_generated
        } else {
            &self.generation_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_extracted: self.records_extracted.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            posts_generated: self.posts_generated.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Records whose address fields were filled since startup.
    pub records_extracted: u64,
    /// Records whose extraction failed since startup.
    pub records_failed: u64,
    /// Successful generation requests.
    pub posts_generated: u64,
    /// Failed generation requests.
    pub generation_failures: u64,
}
