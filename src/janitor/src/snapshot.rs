//! Read-only snapshot handle consumed by the cleanup driver.
//!
//! A snapshot is produced by the transaction engine and borrowed for the
//! duration of one cleanup run. It exposes the table properties that govern
//! retention, the latest complete checkpoint, and the log root; nothing is
//! ever written back through it.

use std::collections::HashMap;
use std::time::Duration;

use object_store::path::Path;
use tracing::warn;

use crate::paths::CheckpointFormat;

/// Table property keys read by the cleanup core.
pub mod properties {
    /// Master switch; `false` disables cleanup entirely.
    pub const ENABLE_EXPIRED_LOG_CLEANUP: &str = "enableExpiredLogCleanup";
    /// Retention horizon: integer milliseconds or a humantime string
    /// (`"30 days"`).
    pub const LOG_RETENTION_MILLIS: &str = "logRetentionMillis";
    /// Protected prefix boundary; 0 or absent disables protection.
    pub const CHECKPOINT_PROTECTION_VERSION: &str = "checkpointProtectionVersion";
    /// Enables the compatibility checkpoint and sidecar collection paths.
    pub const V2_CHECKPOINTS_ENABLED: &str = "v2CheckpointsEnabled";
}

const DEFAULT_LOG_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);

/// Table metadata as a string property map with typed accessors. Unparseable
/// values fall back to the default for their key, with a warning; cleanup
/// must skip, not fail, on bad configuration.
#[derive(Clone, Debug, Default)]
pub struct TableMetadata {
    properties: HashMap<String, String>,
}

impl TableMetadata {
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn cleanup_enabled(&self) -> bool {
        self.bool_property(properties::ENABLE_EXPIRED_LOG_CLEANUP, true)
    }

    pub fn v2_checkpoints_enabled(&self) -> bool {
        self.bool_property(properties::V2_CHECKPOINTS_ENABLED, false)
    }

    pub fn log_retention(&self) -> Duration {
        let Some(raw) = self.property(properties::LOG_RETENTION_MILLIS) else {
            return DEFAULT_LOG_RETENTION;
        };
        match parse_retention(raw) {
            Some(duration) => duration,
            None => {
                warn!(
                    key = properties::LOG_RETENTION_MILLIS,
                    value = raw,
                    "unparseable retention property, using default"
                );
                DEFAULT_LOG_RETENTION
            }
        }
    }

    pub fn checkpoint_protection_version(&self) -> i64 {
        let Some(raw) = self.property(properties::CHECKPOINT_PROTECTION_VERSION) else {
            return 0;
        };
        match raw.trim().parse() {
            Ok(version) => version,
            Err(_) => {
                warn!(
                    key = properties::CHECKPOINT_PROTECTION_VERSION,
                    value = raw,
                    "unparseable protection version, treating as disabled"
                );
                0
            }
        }
    }

    fn bool_property(&self, key: &str, default: bool) -> bool {
        match self.property(key) {
            None => default,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    warn!(key, value = raw, "unparseable boolean property, using default");
                    default
                }
            },
        }
    }
}

fn parse_retention(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().ok().map(Duration::from_millis);
    }
    humantime::parse_duration(raw).ok()
}

/// The latest complete checkpoint known to the snapshot.
#[derive(Clone, Debug)]
pub struct CheckpointProvider {
    pub version: u64,
    pub format: CheckpointFormat,
    /// Top-level files of the checkpoint: the single file for classic and v2
    /// formats, every part for multipart.
    pub top_level_files: Vec<Path>,
}

/// Read-only view of one table version, borrowed for a cleanup run.
#[derive(Clone, Debug)]
pub struct Snapshot {
    version: u64,
    log_root: Path,
    metadata: TableMetadata,
    checkpoint: Option<CheckpointProvider>,
}

impl Snapshot {
    pub fn new(
        version: u64,
        log_root: Path,
        metadata: TableMetadata,
        checkpoint: Option<CheckpointProvider>,
    ) -> Self {
        Self {
            version,
            log_root,
            metadata,
            checkpoint,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn checkpoint(&self) -> Option<&CheckpointProvider> {
        self.checkpoint.as_ref()
    }
}
