//! Orphaned sidecar collection.
//!
//! Deleting a v2 checkpoint can leave its sidecar part-files unreferenced.
//! After a run that removed at least one checkpoint, the sweeper rebuilds the
//! set of sidecars still referenced by any surviving v2 checkpoint and
//! removes the rest, except files younger than the cutoff, which may belong
//! to a checkpoint still being written.

use std::collections::HashSet;
use std::sync::Arc;

use object_store::ObjectStore;
use object_store::path::Path;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::checkpoints::CheckpointReader;
use crate::error::Result;
use crate::listing::LogLister;
use crate::paths::{self, CheckpointFormat, LogFileKind, Serialization};

/// Outcome of one sweep, for the run report.
#[derive(Debug, Clone, Default)]
pub struct SidecarSweepStats {
    /// Surviving v2 checkpoints whose references were collected.
    pub survivors_scanned: usize,
    /// Distinct sidecar filenames still referenced.
    pub active_references: usize,
    /// Files seen in the sidecar directory.
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Unreferenced but younger than the cutoff.
    pub retained_recent: usize,
}

pub struct SidecarSweeper<'a> {
    store: Arc<dyn ObjectStore>,
    reader: &'a dyn CheckpointReader,
}

impl<'a> SidecarSweeper<'a> {
    pub fn new(store: Arc<dyn ObjectStore>, reader: &'a dyn CheckpointReader) -> Self {
        Self { store, reader }
    }

    /// Delete sidecars referenced by no surviving v2 checkpoint and older
    /// than `cutoff_millis`. Individual deletions are best-effort; failures
    /// are counted, not raised.
    pub async fn sweep(&self, log_root: &Path, cutoff_millis: i64) -> Result<SidecarSweepStats> {
        let mut stats = SidecarSweepStats::default();
        let lister = LogLister::new(self.store.clone());

        // Phase 1: surviving v2 top-level indexes.
        let mut survivors = Vec::new();
        let mut stream = lister.list_from(log_root, 0);
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            let LogFileKind::Checkpoint {
                format: CheckpointFormat::V2 { serialization },
                ..
            } = entry.kind
            else {
                continue;
            };
            match serialization {
                Serialization::Parquet | Serialization::Json => survivors.push(entry.location),
                Serialization::Other => {
                    warn!(
                        location = %entry.location,
                        "v2 checkpoint with unrecognized serialization, cannot collect its references"
                    );
                }
            }
        }
        stats.survivors_scanned = survivors.len();

        // Phase 2: the active reference set, as bare filenames.
        let mut active: HashSet<String> = HashSet::new();
        for top_level in &survivors {
            for name in self.reader.sidecar_references(top_level).await? {
                active.insert(name);
            }
        }
        stats.active_references = active.len();

        // Phase 3: sweep the sidecar directory.
        let sidecar_dir = paths::sidecar_dir(log_root);
        let mut sidecars = lister.list_dir(log_root, &sidecar_dir);
        while let Some(entry) = sidecars.next().await {
            let entry = entry?;
            if !matches!(entry.kind, LogFileKind::Sidecar) {
                continue;
            }
            stats.scanned += 1;
            if active.contains(entry.file_name()) {
                continue;
            }
            if entry.modified_millis() >= cutoff_millis {
                stats.retained_recent += 1;
                debug!(location = %entry.location, "unreferenced sidecar is too recent, retaining");
                continue;
            }
            match self.store.delete(&entry.location).await {
                Ok(()) => {
                    stats.deleted += 1;
                    debug!(location = %entry.location, "deleted orphaned sidecar");
                }
                Err(error) => {
                    stats.failed += 1;
                    warn!(location = %entry.location, %error, "failed to delete orphaned sidecar");
                }
            }
        }

        info!(
            survivors = stats.survivors_scanned,
            active = stats.active_references,
            scanned = stats.scanned,
            deleted = stats.deleted,
            failed = stats.failed,
            retained_recent = stats.retained_recent,
            "sidecar sweep complete"
        );
        Ok(stats)
    }
}
