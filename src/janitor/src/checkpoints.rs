//! Checkpoint content collaborators.
//!
//! The cleanup core never interprets checkpoint contents beyond the sidecar
//! reference shape, and otherwise shuttles opaque action rows from a v2
//! top-level index into the compatibility checkpoint it writes. Reading and
//! writing are behind traits so the parquet serialization can plug in from
//! the surrounding system; the NDJSON implementation here serves the json
//! serialization and the tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};

use crate::error::{CleanupError, Result};

/// One checkpoint action row. Opaque except for the sidecar shape,
/// `{"sidecar": {"path": ...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub serde_json::Value);

impl Action {
    /// Bare filename of the referenced sidecar, if this row is a sidecar
    /// reference. References may be absolute or log-relative; only the final
    /// segment identifies the file.
    pub fn sidecar_file_name(&self) -> Option<&str> {
        let path = self.0.get("sidecar")?.get("path")?.as_str()?;
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }

    pub fn sidecar(path: impl Into<String>) -> Self {
        Action(serde_json::json!({ "sidecar": { "path": path.into() } }))
    }
}

/// Yields the sidecar part-files referenced by a v2 top-level index.
#[async_trait]
pub trait CheckpointReader: Send + Sync {
    /// Bare filenames referenced by the checkpoint at `top_level`.
    async fn sidecar_references(&self, top_level: &Path) -> Result<Vec<String>>;
}

/// Streams the action rows out of a v2 top-level index.
#[async_trait]
pub trait ActionSource: Send + Sync {
    async fn read_checkpoint_actions(&self, top_level: &Path) -> Result<Vec<Action>>;
}

/// Writes a classic single-file checkpoint. The destination filename is
/// unique per version, so a direct write without rename suffices.
#[async_trait]
pub trait CheckpointWriter: Send + Sync {
    async fn write_classic_single_file(
        &self,
        actions: &[Action],
        destination: &Path,
    ) -> Result<()>;
}

/// Everything the driver needs from a checkpoint serialization in one handle.
pub trait CheckpointIo: CheckpointReader + ActionSource + CheckpointWriter {}

impl<T: CheckpointReader + ActionSource + CheckpointWriter> CheckpointIo for T {}

/// Newline-delimited JSON serialization: one action row per line.
#[derive(Clone)]
pub struct NdjsonCheckpointIo {
    store: Arc<dyn ObjectStore>,
}

impl NdjsonCheckpointIo {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn read_rows(&self, location: &Path) -> Result<Vec<Action>> {
        let bytes = self.store.get(location).await?.bytes().await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| {
            CleanupError::internal(format!("checkpoint '{location}' is not UTF-8: {e}"))
        })?;
        let mut rows = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let value = serde_json::from_str(line).map_err(|e| {
                CleanupError::internal(format!("malformed action row in '{location}': {e}"))
            })?;
            rows.push(Action(value));
        }
        Ok(rows)
    }
}

#[async_trait]
impl CheckpointReader for NdjsonCheckpointIo {
    async fn sidecar_references(&self, top_level: &Path) -> Result<Vec<String>> {
        let rows = self.read_rows(top_level).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.sidecar_file_name().map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl ActionSource for NdjsonCheckpointIo {
    async fn read_checkpoint_actions(&self, top_level: &Path) -> Result<Vec<Action>> {
        self.read_rows(top_level).await
    }
}

#[async_trait]
impl CheckpointWriter for NdjsonCheckpointIo {
    async fn write_classic_single_file(
        &self,
        actions: &[Action],
        destination: &Path,
    ) -> Result<()> {
        let mut buf = String::new();
        for action in actions {
            buf.push_str(&serde_json::to_string(&action.0).map_err(|e| {
                CleanupError::internal(format!("unserializable action row: {e}"))
            })?);
            buf.push('\n');
        }
        self.store
            .put(destination, PutPayload::from(buf.into_bytes()))
            .await?;
        Ok(())
    }
}

/// Completeness tracking for multipart checkpoint groups encountered during
/// a scan. Groups are keyed by `(version, parts)` since two writers may have
/// produced differently-split checkpoints at the same version.
#[derive(Debug, Default)]
pub struct MultipartProgress {
    groups: HashMap<(u64, u32), HashSet<u32>>,
}

impl MultipartProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed part; true once every part of its group was seen.
    pub fn observe(&mut self, version: u64, part: u32, parts: u32) -> bool {
        let seen = self.groups.entry((version, parts)).or_default();
        seen.insert(part);
        seen.len() as u32 == parts
    }
}
