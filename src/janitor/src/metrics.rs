//! In-process counters for cleanup runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

/// Thread-safe counters accumulated across the runs of one cleaner instance.
#[derive(Debug, Clone, Default)]
pub struct CleanupMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    runs_completed: AtomicUsize,
    runs_skipped_by_gate: AtomicUsize,
    commits_deleted: AtomicUsize,
    checkpoints_deleted: AtomicUsize,
    checksums_deleted: AtomicUsize,
    staged_commits_deleted: AtomicUsize,
    delete_failures: AtomicUsize,
    sidecars_deleted: AtomicUsize,
    sidecar_delete_failures: AtomicUsize,
    compat_checkpoints_written: AtomicUsize,
    /// Version of the most recent compatibility checkpoint, −1 when the last
    /// run skipped the write.
    last_compat_checkpoint_version: AtomicI64,
    compat_checkpoint_elapsed_ms: AtomicU64,
}

impl Default for MetricsInner {
    fn default() -> Self {
        Self {
            runs_completed: AtomicUsize::new(0),
            runs_skipped_by_gate: AtomicUsize::new(0),
            commits_deleted: AtomicUsize::new(0),
            checkpoints_deleted: AtomicUsize::new(0),
            checksums_deleted: AtomicUsize::new(0),
            staged_commits_deleted: AtomicUsize::new(0),
            delete_failures: AtomicUsize::new(0),
            sidecars_deleted: AtomicUsize::new(0),
            sidecar_delete_failures: AtomicUsize::new(0),
            compat_checkpoints_written: AtomicUsize::new(0),
            last_compat_checkpoint_version: AtomicI64::new(-1),
            compat_checkpoint_elapsed_ms: AtomicU64::new(0),
        }
    }
}

impl CleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_completed(&self) {
        self.inner.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_skipped_by_gate(&self) {
        self.inner.runs_skipped_by_gate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commits_deleted(&self, count: usize) {
        self.inner.commits_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_checkpoints_deleted(&self, count: usize) {
        self.inner.checkpoints_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_checksums_deleted(&self, count: usize) {
        self.inner.checksums_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_staged_commits_deleted(&self, count: usize) {
        self.inner
            .staged_commits_deleted
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_delete_failure(&self) {
        self.inner.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sidecars_deleted(&self, count: usize) {
        self.inner.sidecars_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sidecar_delete_failures(&self, count: usize) {
        self.inner
            .sidecar_delete_failures
            .fetch_add(count, Ordering::Relaxed);
    }

    /// `version` is −1 when the run detected an existing classic checkpoint
    /// and skipped the write.
    pub fn record_compat_checkpoint(&self, version: i64, elapsed_ms: u64) {
        if version >= 0 {
            self.inner
                .compat_checkpoints_written
                .fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .last_compat_checkpoint_version
            .store(version, Ordering::Relaxed);
        self.inner
            .compat_checkpoint_elapsed_ms
            .store(elapsed_ms, Ordering::Relaxed);
    }

    pub fn runs_completed(&self) -> usize {
        self.inner.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_skipped_by_gate(&self) -> usize {
        self.inner.runs_skipped_by_gate.load(Ordering::Relaxed)
    }

    pub fn commits_deleted(&self) -> usize {
        self.inner.commits_deleted.load(Ordering::Relaxed)
    }

    pub fn checkpoints_deleted(&self) -> usize {
        self.inner.checkpoints_deleted.load(Ordering::Relaxed)
    }

    pub fn checksums_deleted(&self) -> usize {
        self.inner.checksums_deleted.load(Ordering::Relaxed)
    }

    pub fn staged_commits_deleted(&self) -> usize {
        self.inner.staged_commits_deleted.load(Ordering::Relaxed)
    }

    pub fn delete_failures(&self) -> usize {
        self.inner.delete_failures.load(Ordering::Relaxed)
    }

    pub fn sidecars_deleted(&self) -> usize {
        self.inner.sidecars_deleted.load(Ordering::Relaxed)
    }

    pub fn sidecar_delete_failures(&self) -> usize {
        self.inner.sidecar_delete_failures.load(Ordering::Relaxed)
    }

    pub fn compat_checkpoints_written(&self) -> usize {
        self.inner.compat_checkpoints_written.load(Ordering::Relaxed)
    }

    pub fn last_compat_checkpoint_version(&self) -> i64 {
        self.inner
            .last_compat_checkpoint_version
            .load(Ordering::Relaxed)
    }

    pub fn compat_checkpoint_elapsed_ms(&self) -> u64 {
        self.inner.compat_checkpoint_elapsed_ms.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = CleanupMetrics::new();
        metrics.record_commits_deleted(5);
        metrics.record_commits_deleted(2);
        metrics.record_delete_failure();
        assert_eq!(metrics.commits_deleted(), 7);
        assert_eq!(metrics.delete_failures(), 1);
    }

    #[test]
    fn clones_share_state() {
        let metrics = CleanupMetrics::new();
        let other = metrics.clone();
        other.record_run_completed();
        assert_eq!(metrics.runs_completed(), 1);
    }

    #[test]
    fn compat_version_sentinel() {
        let metrics = CleanupMetrics::new();
        assert_eq!(metrics.last_compat_checkpoint_version(), -1);
        metrics.record_compat_checkpoint(20, 12);
        assert_eq!(metrics.last_compat_checkpoint_version(), 20);
        assert_eq!(metrics.compat_checkpoints_written(), 1);
        metrics.record_compat_checkpoint(-1, 3);
        assert_eq!(metrics.last_compat_checkpoint_version(), -1);
        assert_eq!(metrics.compat_checkpoints_written(), 1);
    }
}
