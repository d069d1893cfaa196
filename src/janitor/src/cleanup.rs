//! The cleanup driver.
//!
//! One `cleanup(snapshot)` invocation walks the pipeline end to end: compute
//! the truncated cutoff, plan expired artifacts, consult the protection
//! gate, ensure the compatibility checkpoint, delete in listing order, drop
//! shadowed unbackfilled commits, and finally collect orphaned sidecars.
//! Per-file failures are counted and skipped; a denied gate skips the whole
//! run without error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use object_store::ObjectStore;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::checkpoints::CheckpointIo;
use crate::clock::{Clock, SystemClock};
use crate::compat::CompatCheckpointer;
use crate::config::RuntimeKnobs;
use crate::error::Result;
use crate::expiry::ExpiryPlanner;
use crate::listing::{LogEntry, LogLister};
use crate::metrics::CleanupMetrics;
use crate::paths::{self, LogFileKind};
use crate::protection::{DenialReason, GateDecision, ProtectionGate};
use crate::protocol::ClientCapabilities;
use crate::sidecar::{SidecarSweepStats, SidecarSweeper};
use crate::snapshot::Snapshot;
use crate::time::{TruncationGranularity, truncate_millis};

/// Cooperative cancellation, checked between object-store operations. A
/// cancelled run returns cleanly with the partial report; every invariant
/// holds at each step boundary, so no repair is needed.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-cleaner configuration: the client-global knobs and capability set,
/// plus dry-run. Table-level settings come from the snapshot instead.
#[derive(Clone, Debug, Default)]
pub struct CleanerConfig {
    pub knobs: RuntimeKnobs,
    pub capabilities: ClientCapabilities,
    /// Plan and gate, log every decision, mutate nothing.
    pub dry_run: bool,
}

/// What one cleanup run did (or, under dry-run, would have done).
#[derive(Clone, Debug, Default)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub cancelled: bool,
    /// Present when the protection gate denied the run.
    pub gate_denied: Option<DenialReason>,
    pub commits_deleted: usize,
    pub checkpoints_deleted: usize,
    pub checksums_deleted: usize,
    pub staged_commits_deleted: usize,
    pub delete_failures: usize,
    pub max_deleted_commit_version: Option<u64>,
    /// Version of the compatibility checkpoint written by this run.
    pub compat_checkpoint_version: Option<u64>,
    pub sidecars: Option<SidecarSweepStats>,
}

impl CleanupReport {
    pub fn files_deleted(&self) -> usize {
        self.commits_deleted + self.checkpoints_deleted + self.checksums_deleted
    }
}

pub struct LogCleaner<IO: CheckpointIo> {
    store: Arc<dyn ObjectStore>,
    checkpoint_io: IO,
    config: CleanerConfig,
    metrics: CleanupMetrics,
    clock: Arc<dyn Clock>,
    cancel: CancelFlag,
}

impl<IO: CheckpointIo> LogCleaner<IO> {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        checkpoint_io: IO,
        config: CleanerConfig,
        metrics: CleanupMetrics,
    ) -> Self {
        Self {
            store,
            checkpoint_io,
            config,
            metrics,
            clock: Arc::new(SystemClock),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn metrics(&self) -> &CleanupMetrics {
        &self.metrics
    }

    /// Remove log artifacts older than the table's retention horizon while
    /// preserving reconstructibility of every retained version. Skips, does
    /// not fail, whenever going ahead would violate an invariant.
    pub async fn cleanup(&self, snapshot: &Snapshot) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let metadata = snapshot.metadata();
        if !metadata.cleanup_enabled() {
            debug!("log cleanup disabled by table property");
            return Ok(report);
        }
        let Some(provider) = snapshot.checkpoint() else {
            debug!("no complete checkpoint, nothing can be deleted");
            return Ok(report);
        };
        // Versions up to the latest checkpoint minus one stay reconstructible.
        let Some(threshold_version) = provider.version.checked_sub(1) else {
            return Ok(report);
        };

        let retention = metadata.log_retention();
        let retention_millis = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let now = self.clock.now_millis();
        let cutoff = truncate_millis(
            now.saturating_sub(retention_millis),
            TruncationGranularity::Day,
        );
        debug!(
            cutoff,
            threshold_version,
            snapshot_version = snapshot.version(),
            "planning expired log artifacts"
        );

        let plan = self.plan_expired(snapshot, cutoff, threshold_version).await?;
        if plan.is_empty() {
            debug!("no expired log artifacts");
            return Ok(report);
        }

        let gate = ProtectionGate::new(
            self.store.clone(),
            self.config.knobs,
            self.config.capabilities.clone(),
        );
        if let GateDecision::Denied(reason) = gate.evaluate(snapshot, &plan).await? {
            info!(%reason, planned = plan.len(), "skipping log cleanup");
            self.metrics.record_run_skipped_by_gate();
            report.gate_denied = Some(reason);
            return Ok(report);
        }

        if self.config.dry_run {
            return Ok(self.report_dry_run(report, &plan));
        }

        // The compatibility checkpoint must exist before the first deletion.
        if metadata.v2_checkpoints_enabled() {
            let compat = CompatCheckpointer::new(
                self.store.clone(),
                &self.checkpoint_io,
                &self.checkpoint_io,
                &self.metrics,
            );
            report.compat_checkpoint_version = compat.ensure_classic_checkpoint(snapshot).await?;
        }

        let mut any_checkpoint_deleted = false;
        for entry in &plan {
            if self.cancel.is_cancelled() {
                return Ok(self.finish_cancelled(report));
            }
            if self.delete_entry(entry, &mut report).await {
                match entry.kind {
                    LogFileKind::Commit { version, .. } => {
                        report.max_deleted_commit_version = Some(
                            report
                                .max_deleted_commit_version
                                .map_or(version, |m| m.max(version)),
                        );
                    }
                    LogFileKind::Checkpoint { .. } => any_checkpoint_deleted = true,
                    _ => {}
                }
            }
        }

        if let Some(max_version) = report.max_deleted_commit_version {
            self.delete_shadowed_staged_commits(snapshot, max_version, &mut report)
                .await?;
            if report.cancelled {
                return Ok(report);
            }
        }

        if any_checkpoint_deleted && metadata.v2_checkpoints_enabled() {
            let sweeper = SidecarSweeper::new(self.store.clone(), &self.checkpoint_io);
            report.sidecars = Some(sweeper.sweep(snapshot.log_root(), cutoff).await?);
        }

        self.record_and_log(&report);
        Ok(report)
    }

    /// Collect the deletion plan: retained-kind artifacts below the safety
    /// threshold whose successor is older than the cutoff.
    async fn plan_expired(
        &self,
        snapshot: &Snapshot,
        cutoff: i64,
        threshold_version: u64,
    ) -> Result<Vec<LogEntry>> {
        let lister = LogLister::new(self.store.clone());
        let mut stream = lister.list_from(snapshot.log_root(), 0);
        let mut planner = ExpiryPlanner::new(cutoff, threshold_version);
        let mut plan = Vec::new();
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            match entry.kind {
                LogFileKind::Commit { backfilled: true, .. }
                | LogFileKind::Checkpoint { .. }
                | LogFileKind::Checksum { .. } => {
                    plan.extend(planner.observe(entry));
                    if planner.beyond_threshold() {
                        break;
                    }
                }
                _ => {}
            }
        }
        plan.extend(planner.finish());
        Ok(plan)
    }

    /// Delete one artifact, tolerating per-file failure. True if this run
    /// removed it.
    async fn delete_entry(&self, entry: &LogEntry, report: &mut CleanupReport) -> bool {
        match self.store.delete(&entry.location).await {
            Ok(()) => {
                match entry.kind {
                    LogFileKind::Commit { .. } => report.commits_deleted += 1,
                    LogFileKind::Checkpoint { .. } => report.checkpoints_deleted += 1,
                    LogFileKind::Checksum { .. } => report.checksums_deleted += 1,
                    _ => {}
                }
                debug!(location = %entry.location, "deleted expired log artifact");
                true
            }
            Err(object_store::Error::NotFound { .. }) => {
                report.delete_failures += 1;
                debug!(location = %entry.location, "expired log artifact already absent");
                false
            }
            Err(error) => {
                report.delete_failures += 1;
                warn!(location = %entry.location, %error, "failed to delete expired log artifact");
                false
            }
        }
    }

    async fn delete_shadowed_staged_commits(
        &self,
        snapshot: &Snapshot,
        max_deleted_commit_version: u64,
        report: &mut CleanupReport,
    ) -> Result<()> {
        let staged_dir = paths::staged_commits_dir(snapshot.log_root());
        let lister = LogLister::new(self.store.clone());
        let mut stream = lister.list_dir(snapshot.log_root(), &staged_dir);
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            let LogFileKind::Commit {
                version,
                backfilled: false,
            } = entry.kind
            else {
                continue;
            };
            // A staged commit may not outlive its backfilled twin.
            if version > max_deleted_commit_version {
                continue;
            }
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                self.record_and_log(report);
                return Ok(());
            }
            match self.store.delete(&entry.location).await {
                Ok(()) => {
                    report.staged_commits_deleted += 1;
                    debug!(location = %entry.location, version, "deleted shadowed staged commit");
                }
                Err(error) => {
                    report.delete_failures += 1;
                    warn!(location = %entry.location, %error, "failed to delete staged commit");
                }
            }
        }
        Ok(())
    }

    fn report_dry_run(&self, mut report: CleanupReport, plan: &[LogEntry]) -> CleanupReport {
        for entry in plan {
            info!(location = %entry.location, "dry-run: would delete expired log artifact");
            match entry.kind {
                LogFileKind::Commit { version, .. } => {
                    report.commits_deleted += 1;
                    report.max_deleted_commit_version =
                        Some(report.max_deleted_commit_version.map_or(version, |m| m.max(version)));
                }
                LogFileKind::Checkpoint { .. } => report.checkpoints_deleted += 1,
                LogFileKind::Checksum { .. } => report.checksums_deleted += 1,
                _ => {}
            }
        }
        info!(
            planned = plan.len(),
            "dry-run: cleanup plan computed, nothing deleted"
        );
        report
    }

    fn finish_cancelled(&self, mut report: CleanupReport) -> CleanupReport {
        report.cancelled = true;
        self.record_and_log(&report);
        report
    }

    fn record_and_log(&self, report: &CleanupReport) {
        self.metrics.record_commits_deleted(report.commits_deleted);
        self.metrics
            .record_checkpoints_deleted(report.checkpoints_deleted);
        self.metrics
            .record_checksums_deleted(report.checksums_deleted);
        self.metrics
            .record_staged_commits_deleted(report.staged_commits_deleted);
        if let Some(stats) = &report.sidecars {
            self.metrics.record_sidecars_deleted(stats.deleted);
            self.metrics.record_sidecar_delete_failures(stats.failed);
        }
        self.metrics.record_run_completed();
        info!(
            commits = report.commits_deleted,
            checkpoints = report.checkpoints_deleted,
            checksums = report.checksums_deleted,
            staged = report.staged_commits_deleted,
            failures = report.delete_failures,
            cancelled = report.cancelled,
            "log cleanup run finished"
        );
    }
}
