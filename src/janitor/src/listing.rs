//! Lazy, forward-only enumeration of the log directory.
//!
//! Listing order is lexicographic, which the zero-padded naming scheme makes
//! equal to version order. A missing directory is an empty stream, not an
//! error; any other listing failure surfaces as `StorageUnavailable`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::ready;
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};

use crate::error::{CleanupError, Result};
use crate::paths::{self, LogFileKind};

/// One classified log artifact as returned by the lister.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub location: Path,
    pub kind: LogFileKind,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl LogEntry {
    fn from_meta(log_root: &Path, meta: ObjectMeta) -> Self {
        Self {
            kind: paths::classify(log_root, &meta.location),
            location: meta.location,
            last_modified: meta.last_modified,
            size: meta.size,
        }
    }

    pub fn version(&self) -> Option<u64> {
        self.kind.version()
    }

    pub fn modified_millis(&self) -> i64 {
        self.last_modified.timestamp_millis()
    }

    /// Bare filename of this artifact.
    pub fn file_name(&self) -> &str {
        self.location.filename().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct LogLister {
    store: Arc<dyn ObjectStore>,
}

impl LogLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Entries under the log root from `start_version` on, in name order.
    /// Restartable: the offset is the zero-padded version string, which sorts
    /// strictly before every artifact of that version.
    pub fn list_from(
        &self,
        log_root: &Path,
        start_version: u64,
    ) -> BoxStream<'static, Result<LogEntry>> {
        let offset = log_root.child(paths::version_prefix(start_version));
        let raw = self.store.list_with_offset(Some(log_root), &offset);
        Self::adapt(log_root.clone(), raw)
    }

    /// Entries under an arbitrary subdirectory of the log, classified
    /// against `log_root`.
    pub fn list_dir(&self, log_root: &Path, dir: &Path) -> BoxStream<'static, Result<LogEntry>> {
        let raw = self.store.list(Some(dir));
        Self::adapt(log_root.clone(), raw)
    }

    fn adapt(
        log_root: Path,
        raw: BoxStream<'static, object_store::Result<ObjectMeta>>,
    ) -> BoxStream<'static, Result<LogEntry>> {
        raw.filter_map(move |item| {
            ready(match item {
                Ok(meta) => Some(Ok(LogEntry::from_meta(&log_root, meta))),
                // A log directory that was never created lists as empty.
                Err(object_store::Error::NotFound { .. }) => None,
                Err(source) => Some(Err(CleanupError::StorageUnavailable { source })),
            })
        })
        .boxed()
    }
}
