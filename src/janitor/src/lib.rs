//! Metadata retention and cleanup core for the transactional table log.
//!
//! A table is an append-only log directory on an object store: per-version
//! commit records, periodic checkpoint snapshots (possibly with sidecar
//! part-files), and checksum records. This crate owns the destructive side
//! of that log's lifecycle: discarding artifacts past the retention horizon
//! while every still-reachable snapshot stays reconstructible.
//!
//! The entry point is [`LogCleaner::cleanup`], which pipelines:
//!
//! 1. truncating the cutoff to a UTC day boundary ([`time`]),
//! 2. planning deletions with one-version lookahead ([`expiry`]),
//! 3. the checkpoint-protection gate ([`protection`]),
//! 4. the pre-v2-reader compatibility checkpoint ([`compat`]),
//! 5. deletions in listing order, shadowed staged commits included,
//! 6. orphaned sidecar collection ([`sidecar`]).
//!
//! The driver skips rather than fails when an invariant would otherwise be
//! violated; only an unreachable object store surfaces as an error.

pub mod checkpoints;
pub mod cleanup;
pub mod clock;
pub mod compat;
pub mod config;
pub mod error;
pub mod expiry;
pub mod listing;
pub mod metrics;
pub mod paths;
pub mod protection;
pub mod protocol;
pub mod sidecar;
pub mod snapshot;
pub mod time;

pub use checkpoints::{Action, ActionSource, CheckpointIo, CheckpointReader, CheckpointWriter, NdjsonCheckpointIo};
pub use cleanup::{CancelFlag, CleanerConfig, CleanupReport, LogCleaner};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RuntimeKnobs;
pub use error::CleanupError;
pub use metrics::CleanupMetrics;
pub use protocol::{ChecksumRecord, ClientCapabilities, Protocol};
pub use snapshot::{CheckpointProvider, Snapshot, TableMetadata};
