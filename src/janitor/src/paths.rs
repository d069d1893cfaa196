//! Naming scheme for table-log artifacts.
//!
//! Everything in the log directory is addressed by a zero-padded version
//! number so that lexicographic listing order equals version order:
//!
//! - `"{version:020}.json"`: backfilled commit
//! - `"_staged_commits/{version:020}.{uuid}.json"`: unbackfilled commit
//! - `"{version:020}.crc"`: checksum record
//! - `"{version:020}.checkpoint.parquet"`: classic single-file checkpoint
//! - `"{version:020}.checkpoint.{part:010}.{parts:010}.parquet"`: classic
//!   multipart checkpoint
//! - `"{version:020}.checkpoint.{uuid}.parquet|json"`: v2 checkpoint
//!   top-level index
//! - `"_sidecars/{name}"`: sidecar part-files referenced by v2 checkpoints
//!
//! Classification is pure and total: unrecognized names come back as
//! [`LogFileKind::Unknown`], never as an error.

use object_store::path::Path;

use crate::error::{CleanupError, Result};

pub const LOG_DIR_NAME: &str = "_txn_log";
pub const SIDECAR_DIR_NAME: &str = "_sidecars";
pub const STAGED_COMMITS_DIR_NAME: &str = "_staged_commits";

const VERSION_DIGITS: usize = 20;
const MULTIPART_DIGITS: usize = 10;

/// On-disk serialization of a v2 checkpoint top-level index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Serialization {
    Parquet,
    Json,
    Other,
}

impl Serialization {
    fn from_extension(ext: &str) -> Self {
        match ext {
            "parquet" => Serialization::Parquet,
            "json" => Serialization::Json,
            _ => Serialization::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// One parquet file holding the whole snapshot.
    ClassicSingle,
    /// Pre-v2 multipart checkpoint; complete only when all `parts` exist.
    ClassicMultipart { part: u32, parts: u32 },
    /// Top-level index that references sidecar part-files.
    V2 { serialization: Serialization },
}

impl CheckpointFormat {
    pub fn is_v2(&self) -> bool {
        matches!(self, CheckpointFormat::V2 { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFileKind {
    Commit { version: u64, backfilled: bool },
    Checkpoint { version: u64, format: CheckpointFormat },
    Checksum { version: u64 },
    Sidecar,
    Unknown,
}

impl LogFileKind {
    /// The version this artifact belongs to, for the versioned kinds.
    pub fn version(&self) -> Option<u64> {
        match self {
            LogFileKind::Commit { version, .. }
            | LogFileKind::Checkpoint { version, .. }
            | LogFileKind::Checksum { version } => Some(*version),
            LogFileKind::Sidecar | LogFileKind::Unknown => None,
        }
    }
}

/// Classify a location relative to the log root. Never fails.
pub fn classify(log_root: &Path, location: &Path) -> LogFileKind {
    let Some(mut rest) = location.prefix_match(log_root) else {
        return LogFileKind::Unknown;
    };
    let Some(first) = rest.next() else {
        return LogFileKind::Unknown;
    };
    let Some(second) = rest.next() else {
        return classify_root_name(first.as_ref());
    };
    if rest.next().is_some() {
        return LogFileKind::Unknown;
    }
    match first.as_ref() {
        SIDECAR_DIR_NAME => LogFileKind::Sidecar,
        STAGED_COMMITS_DIR_NAME => classify_staged_name(second.as_ref()),
        _ => LogFileKind::Unknown,
    }
}

/// Version of a classified artifact; `Internal` if the path carries none.
pub fn version_of(log_root: &Path, location: &Path) -> Result<u64> {
    classify(log_root, location).version().ok_or_else(|| {
        CleanupError::internal(format!("path '{location}' does not carry a version"))
    })
}

fn classify_root_name(name: &str) -> LogFileKind {
    let Some((version, remainder)) = split_version(name) else {
        return LogFileKind::Unknown;
    };
    if remainder == "json" {
        return LogFileKind::Commit {
            version,
            backfilled: true,
        };
    }
    if remainder == "crc" {
        return LogFileKind::Checksum { version };
    }
    if let Some(rest) = remainder.strip_prefix("checkpoint.") {
        return classify_checkpoint(version, rest);
    }
    LogFileKind::Unknown
}

fn classify_checkpoint(version: u64, rest: &str) -> LogFileKind {
    let tokens: Vec<&str> = rest.split('.').collect();
    match tokens.as_slice() {
        ["parquet"] => LogFileKind::Checkpoint {
            version,
            format: CheckpointFormat::ClassicSingle,
        },
        [part, parts, "parquet"] if is_part_number(part) && is_part_number(parts) => {
            match (part.parse::<u32>(), parts.parse::<u32>()) {
                (Ok(part), Ok(parts)) if part >= 1 && part <= parts => LogFileKind::Checkpoint {
                    version,
                    format: CheckpointFormat::ClassicMultipart { part, parts },
                },
                _ => LogFileKind::Unknown,
            }
        }
        [unique, ext] if !unique.is_empty() && !ext.is_empty() => LogFileKind::Checkpoint {
            version,
            format: CheckpointFormat::V2 {
                serialization: Serialization::from_extension(ext),
            },
        },
        _ => LogFileKind::Unknown,
    }
}

fn classify_staged_name(name: &str) -> LogFileKind {
    let Some((version, remainder)) = split_version(name) else {
        return LogFileKind::Unknown;
    };
    match remainder.rsplit_once('.') {
        Some((unique, "json")) if !unique.is_empty() => LogFileKind::Commit {
            version,
            backfilled: false,
        },
        _ => LogFileKind::Unknown,
    }
}

fn split_version(name: &str) -> Option<(u64, &str)> {
    let (digits, rest) = name.split_once('.')?;
    if digits.len() != VERSION_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|version| (version, rest))
}

fn is_part_number(token: &str) -> bool {
    token.len() == MULTIPART_DIGITS && token.bytes().all(|b| b.is_ascii_digit())
}

pub fn log_root_for_table(table_root: &Path) -> Path {
    table_root.child(LOG_DIR_NAME)
}

pub fn sidecar_dir(log_root: &Path) -> Path {
    log_root.child(SIDECAR_DIR_NAME)
}

pub fn staged_commits_dir(log_root: &Path) -> Path {
    log_root.child(STAGED_COMMITS_DIR_NAME)
}

pub fn commit_path(log_root: &Path, version: u64) -> Path {
    log_root.child(format!("{version:020}.json"))
}

pub fn checksum_path(log_root: &Path, version: u64) -> Path {
    log_root.child(format!("{version:020}.crc"))
}

/// Destination of the single-file classic checkpoint for `version`. This is
/// the one artifact the cleanup core itself writes.
pub fn classic_checkpoint_path(log_root: &Path, version: u64) -> Path {
    log_root.child(format!("{version:020}.checkpoint.parquet"))
}

/// Zero-padded version string, the listing offset for that version.
pub fn version_prefix(version: u64) -> String {
    format!("{version:020}")
}
