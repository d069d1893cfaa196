//! Compatibility checkpoint for pre-v2 readers.
//!
//! Once a table's only checkpoints are v2-format, a pre-v2 reader that
//! replays the log after old commits were cleaned up fails with a confusing
//! "file not found" instead of a clean protocol error. Before destructive
//! work, the cleaner therefore makes sure a classic-format checkpoint exists
//! at (or before) the current checkpoint version, synthesizing a single-file
//! one from the v2 top-level index if needed.

use std::sync::Arc;
use std::time::Instant;

use object_store::ObjectStore;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::checkpoints::{ActionSource, CheckpointWriter, MultipartProgress};
use crate::error::{CleanupError, Result};
use crate::listing::LogLister;
use crate::metrics::CleanupMetrics;
use crate::paths::{self, CheckpointFormat, LogFileKind};
use crate::snapshot::Snapshot;

pub struct CompatCheckpointer<'a> {
    store: Arc<dyn ObjectStore>,
    actions: &'a dyn ActionSource,
    writer: &'a dyn CheckpointWriter,
    metrics: &'a CleanupMetrics,
}

impl<'a> CompatCheckpointer<'a> {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        actions: &'a dyn ActionSource,
        writer: &'a dyn CheckpointWriter,
        metrics: &'a CleanupMetrics,
    ) -> Self {
        Self {
            store,
            actions,
            writer,
            metrics,
        }
    }

    /// Ensure a classic-format checkpoint covers the snapshot's current
    /// checkpoint version. Returns the version written, or `None` when no
    /// write was needed. Idempotent under retry: a second invocation finds
    /// the checkpoint written by the first and returns early.
    pub async fn ensure_classic_checkpoint(&self, snapshot: &Snapshot) -> Result<Option<u64>> {
        let started = Instant::now();
        let Some(provider) = snapshot.checkpoint() else {
            return Ok(None);
        };
        if !provider.format.is_v2() {
            debug!(version = provider.version, "current checkpoint is already classic");
            return Ok(None);
        }
        if self.classic_checkpoint_up_to(snapshot, provider.version).await? {
            self.metrics
                .record_compat_checkpoint(-1, started.elapsed().as_millis() as u64);
            return Ok(None);
        }

        let top_level = provider.top_level_files.first().ok_or_else(|| {
            CleanupError::internal(format!(
                "v2 checkpoint at version {} has no top-level index",
                provider.version
            ))
        })?;
        let actions = self.actions.read_checkpoint_actions(top_level).await?;
        let destination = paths::classic_checkpoint_path(snapshot.log_root(), provider.version);
        self.writer
            .write_classic_single_file(&actions, &destination)
            .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics
            .record_compat_checkpoint(provider.version as i64, elapsed_ms);
        info!(
            version = provider.version,
            actions = actions.len(),
            elapsed_ms,
            "wrote compatibility checkpoint"
        );
        Ok(Some(provider.version))
    }

    /// Any complete non-v2 checkpoint at a version ≤ `through`?
    async fn classic_checkpoint_up_to(&self, snapshot: &Snapshot, through: u64) -> Result<bool> {
        let lister = LogLister::new(self.store.clone());
        let mut stream = lister.list_from(snapshot.log_root(), 0);
        let mut multipart = MultipartProgress::new();
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            let LogFileKind::Checkpoint { version, format } = entry.kind else {
                continue;
            };
            if version > through {
                break;
            }
            match format {
                CheckpointFormat::ClassicSingle => return Ok(true),
                CheckpointFormat::ClassicMultipart { part, parts } => {
                    if multipart.observe(version, part, parts) {
                        return Ok(true);
                    }
                }
                CheckpointFormat::V2 { .. } => {}
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoints::{Action, CheckpointReader, NdjsonCheckpointIo};
    use crate::snapshot::{CheckpointProvider, TableMetadata};
    use crate::paths::Serialization;
    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use object_store::path::Path;

    fn log_root() -> Path {
        Path::from("t/_txn_log")
    }

    fn v2_top_level(version: u64) -> Path {
        log_root().child(format!(
            "{}.checkpoint.8e1bf387-28ff-4a1c-8c67-ef9b97c5a522.json",
            paths::version_prefix(version)
        ))
    }

    fn v2_snapshot(version: u64) -> Snapshot {
        Snapshot::new(
            version + 5,
            log_root(),
            TableMetadata::default(),
            Some(CheckpointProvider {
                version,
                format: CheckpointFormat::V2 {
                    serialization: Serialization::Json,
                },
                top_level_files: vec![v2_top_level(version)],
            }),
        )
    }

    async fn seed_v2_checkpoint(io: &NdjsonCheckpointIo, version: u64) -> Vec<Action> {
        let actions = vec![
            Action(serde_json::json!({ "metaData": { "id": "t" } })),
            Action::sidecar("part-00001.parquet"),
        ];
        io.write_classic_single_file(&actions, &v2_top_level(version))
            .await
            .unwrap();
        actions
    }

    #[tokio::test]
    async fn synthesizes_classic_checkpoint() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let io = NdjsonCheckpointIo::new(store.clone());
        seed_v2_checkpoint(&io, 20).await;

        let metrics = CleanupMetrics::new();
        let compat = CompatCheckpointer::new(store.clone(), &io, &io, &metrics);
        let written = compat
            .ensure_classic_checkpoint(&v2_snapshot(20))
            .await
            .unwrap();
        assert_eq!(written, Some(20));
        assert_eq!(metrics.last_compat_checkpoint_version(), 20);

        let destination = paths::classic_checkpoint_path(&log_root(), 20);
        let rows = io.read_checkpoint_actions(&destination).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            io.sidecar_references(&destination).await.unwrap(),
            vec!["part-00001.parquet".to_string()]
        );
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let io = NdjsonCheckpointIo::new(store.clone());
        seed_v2_checkpoint(&io, 20).await;

        let metrics = CleanupMetrics::new();
        let compat = CompatCheckpointer::new(store.clone(), &io, &io, &metrics);
        let snapshot = v2_snapshot(20);
        assert_eq!(
            compat.ensure_classic_checkpoint(&snapshot).await.unwrap(),
            Some(20)
        );
        assert_eq!(compat.ensure_classic_checkpoint(&snapshot).await.unwrap(), None);
        assert_eq!(metrics.compat_checkpoints_written(), 1);
        assert_eq!(metrics.last_compat_checkpoint_version(), -1);
    }

    #[tokio::test]
    async fn classic_provider_needs_nothing() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let io = NdjsonCheckpointIo::new(store.clone());
        let metrics = CleanupMetrics::new();
        let compat = CompatCheckpointer::new(store.clone(), &io, &io, &metrics);

        let snapshot = Snapshot::new(
            10,
            log_root(),
            TableMetadata::default(),
            Some(CheckpointProvider {
                version: 10,
                format: CheckpointFormat::ClassicSingle,
                top_level_files: vec![paths::classic_checkpoint_path(&log_root(), 10)],
            }),
        );
        assert_eq!(compat.ensure_classic_checkpoint(&snapshot).await.unwrap(), None);
        assert_eq!(metrics.compat_checkpoints_written(), 0);
    }

    #[tokio::test]
    async fn earlier_classic_checkpoint_suffices() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let io = NdjsonCheckpointIo::new(store.clone());
        seed_v2_checkpoint(&io, 20).await;
        store
            .put(
                &paths::classic_checkpoint_path(&log_root(), 15),
                PutPayload::from_static(b""),
            )
            .await
            .unwrap();

        let metrics = CleanupMetrics::new();
        let compat = CompatCheckpointer::new(store.clone(), &io, &io, &metrics);
        assert_eq!(
            compat
                .ensure_classic_checkpoint(&v2_snapshot(20))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn incomplete_multipart_does_not_suffice() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let io = NdjsonCheckpointIo::new(store.clone());
        seed_v2_checkpoint(&io, 20).await;
        let part = log_root().child(format!(
            "{}.checkpoint.0000000001.0000000003.parquet",
            paths::version_prefix(12)
        ));
        store.put(&part, PutPayload::from_static(b"")).await.unwrap();

        let metrics = CleanupMetrics::new();
        let compat = CompatCheckpointer::new(store.clone(), &io, &io, &metrics);
        assert_eq!(
            compat
                .ensure_classic_checkpoint(&v2_snapshot(20))
                .await
                .unwrap(),
            Some(20)
        );
    }
}
