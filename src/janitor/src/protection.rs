//! Checkpoint-protection gate.
//!
//! Tables may declare a protection version below which history must not be
//! discarded unless the client can demonstrate full protocol support. The
//! gate inspects a proposed deletion plan and either permits the run or
//! denies it outright: a denied run skips cleanly and never attempts a
//! partial cleanup up to some other boundary.

use std::fmt;
use std::sync::Arc;

use object_store::path::Path;
use object_store::ObjectStore;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::checkpoints::MultipartProgress;
use crate::config::RuntimeKnobs;
use crate::error::Result;
use crate::listing::LogEntry;
use crate::paths::{self, CheckpointFormat, LogFileKind};
use crate::protocol::{ChecksumRecord, ClientCapabilities};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Permitted,
    Denied(DenialReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The all-protocols-supported path is disabled by a runtime knob.
    ProtocolPathDisabled,
    MissingChecksum { version: u64 },
    ChecksumWithoutProtocol { version: u64 },
    UnsupportedForRead { version: u64 },
    UnsupportedForWrite { version: u64 },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::ProtocolPathDisabled => {
                write!(f, "protocol-supported cleanup path is disabled")
            }
            DenialReason::MissingChecksum { version } => {
                write!(f, "no checksum record for protected version {version}")
            }
            DenialReason::ChecksumWithoutProtocol { version } => {
                write!(f, "checksum for protected version {version} carries no protocol")
            }
            DenialReason::UnsupportedForRead { version } => {
                write!(f, "protocol at protected version {version} is not read-supported")
            }
            DenialReason::UnsupportedForWrite { version } => {
                write!(f, "protocol at boundary version {version} is not write-supported")
            }
        }
    }
}

pub struct ProtectionGate {
    store: Arc<dyn ObjectStore>,
    knobs: RuntimeKnobs,
    capabilities: ClientCapabilities,
}

impl ProtectionGate {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        knobs: RuntimeKnobs,
        capabilities: ClientCapabilities,
    ) -> Self {
        Self {
            store,
            knobs,
            capabilities,
        }
    }

    /// Decide whether `plan` honors the protection invariant of `snapshot`.
    pub async fn evaluate(&self, snapshot: &Snapshot, plan: &[LogEntry]) -> Result<GateDecision> {
        let protection = snapshot.metadata().checkpoint_protection_version();
        if protection <= 0 {
            return Ok(GateDecision::Permitted);
        }
        let protection = protection as u64;

        // Range of planned commit deletions inside the protected prefix.
        // Commits are monotone in the plan, so stop at the first one past it.
        let mut range: Option<(u64, u64)> = None;
        for entry in plan {
            if let LogFileKind::Commit {
                version,
                backfilled: true,
            } = entry.kind
            {
                if version >= protection {
                    break;
                }
                range = Some(match range {
                    None => (version, version),
                    Some((lo, _)) => (lo, version),
                });
            }
        }
        let Some((lo, hi)) = range else {
            return Ok(GateDecision::Permitted);
        };

        // Deleting the entire protected prefix is the invariant's own escape
        // clause.
        if hi >= protection - 1 {
            return Ok(GateDecision::Permitted);
        }

        let boundary = hi + 1;
        if self.knobs.boundary_checkpoint_check_enabled
            && complete_checkpoint_at(&self.store, snapshot.log_root(), boundary).await?
        {
            debug!(boundary, "deletion range anchored by existing checkpoint");
            return Ok(GateDecision::Permitted);
        }

        if !self.knobs.allow_cleanup_when_all_protocols_supported {
            return Ok(GateDecision::Denied(DenialReason::ProtocolPathDisabled));
        }

        for version in lo..=boundary {
            let Some(record) = self.read_checksum(snapshot.log_root(), version).await? else {
                return Ok(GateDecision::Denied(DenialReason::MissingChecksum { version }));
            };
            let Some(protocol) = record.protocol else {
                return Ok(GateDecision::Denied(DenialReason::ChecksumWithoutProtocol {
                    version,
                }));
            };
            if !self.capabilities.supported_for_read(&protocol) {
                return Ok(GateDecision::Denied(DenialReason::UnsupportedForRead {
                    version,
                }));
            }
            // The boundary version gets a fresh checkpoint, which is a write.
            if version == boundary && !self.capabilities.supported_for_write(&protocol) {
                return Ok(GateDecision::Denied(DenialReason::UnsupportedForWrite {
                    version,
                }));
            }
        }

        Ok(GateDecision::Permitted)
    }

    async fn read_checksum(
        &self,
        log_root: &Path,
        version: u64,
    ) -> Result<Option<ChecksumRecord>> {
        let location = paths::checksum_path(log_root, version);
        let bytes = match self.store.get(&location).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(source) => return Err(source.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                // A checksum we cannot parse gives the same guarantee as one
                // without a protocol: none.
                debug!(%location, %error, "unparseable checksum record");
                Ok(Some(ChecksumRecord::default()))
            }
        }
    }
}

/// Is there a complete checkpoint of any format at exactly `version`?
pub(crate) async fn complete_checkpoint_at(
    store: &Arc<dyn ObjectStore>,
    log_root: &Path,
    version: u64,
) -> Result<bool> {
    // The offset string sorts just before that version's checkpoint files.
    let offset = log_root.child(format!("{}.checkpoint", paths::version_prefix(version)));
    let mut stream = store.list_with_offset(Some(log_root), &offset);
    let mut multipart = MultipartProgress::new();
    while let Some(meta) = stream.next().await {
        let meta = match meta {
            Ok(meta) => meta,
            Err(object_store::Error::NotFound { .. }) => break,
            Err(source) => return Err(source.into()),
        };
        match paths::classify(log_root, &meta.location) {
            LogFileKind::Checkpoint { version: v, format } if v == version => match format {
                CheckpointFormat::ClassicSingle | CheckpointFormat::V2 { .. } => return Ok(true),
                CheckpointFormat::ClassicMultipart { part, parts } => {
                    if multipart.observe(v, part, parts) {
                        return Ok(true);
                    }
                }
            },
            // Past this version's checkpoint files; nothing more can match.
            _ => break,
        }
    }
    Ok(false)
}
