//! Tracing setup and upload counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second initialization (tests, embedding apps) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Per-orchestrator counters
#[derive(Debug, Default)]
pub struct Metrics {
    uploads_started: AtomicU64,
    uploads_completed: AtomicU64,
    uploads_failed: AtomicU64,
    uploads_rejected: AtomicU64,
    uploads_vetoed: AtomicU64,
    progress_samples: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_started(&self) {
        self.uploads_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_started", "Metric incremented");
    }

    pub fn upload_completed(&self) {
        self.uploads_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_completed", "Metric incremented");
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_failed", "Metric incremented");
    }

    pub fn upload_rejected(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_rejected", "Metric incremented");
    }

    pub fn upload_vetoed(&self) {
        self.uploads_vetoed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_vetoed", "Metric incremented");
    }

    pub fn progress_sample(&self) {
        self.progress_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_started: self.uploads_started.load(Ordering::Relaxed),
            uploads_completed: self.uploads_completed.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            uploads_vetoed: self.uploads_vetoed.load(Ordering::Relaxed),
            progress_samples: self.progress_samples.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uploads_started: u64,
    pub uploads_completed: u64,
    pub uploads_failed: u64,
    pub uploads_rejected: u64,
    pub uploads_vetoed: u64,
    pub progress_samples: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.upload_started();
        metrics.upload_completed();
        metrics.progress_sample();
        metrics.progress_sample();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_started, 1);
        assert_eq!(snapshot.uploads_completed, 1);
        assert_eq!(snapshot.progress_samples, 2);
        assert_eq!(snapshot.uploads_failed, 0);
    }
}
