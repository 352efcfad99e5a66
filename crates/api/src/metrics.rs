use pipeline::OutputMetadata;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Process-wide run counters
pub struct Metrics {
    // Counters
    runs_started: AtomicUsize,
    runs_succeeded: AtomicUsize,
    runs_failed: AtomicUsize,

    // Totals over successful runs
    total_processing_time_ms: AtomicU64,
    total_concepts: AtomicUsize,
    total_links: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runs_started: AtomicUsize::new(0),
            runs_succeeded: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            total_processing_time_ms: AtomicU64::new(0),
            total_concepts: AtomicUsize::new(0),
            total_links: AtomicUsize::new(0),
        })
    }

    pub fn record_start(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, metadata: &OutputMetadata) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ms.fetch_add(metadata.processing_time_ms, Ordering::Relaxed);
        self.total_concepts.fetch_add(metadata.total_concepts, Ordering::Relaxed);
        self.total_links.fetch_add(metadata.total_links, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.runs_succeeded.load(Ordering::Relaxed);
        let total_time = self.total_processing_time_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: succeeded,
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            avg_processing_time_ms: if succeeded > 0 {
                total_time as f64 / succeeded as f64
            } else {
                0.0
            },
            total_concepts: self.total_concepts.load(Ordering::Relaxed),
            total_links: self.total_links.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: usize,
    pub runs_succeeded: usize,
    pub runs_failed: usize,
    pub avg_processing_time_ms: f64,
    pub total_concepts: usize,
    pub total_links: usize,
}
