//! Boundary-buffered selection of expired log artifacts.
//!
//! A version's artifacts may only be deleted once two things are known:
//! a later checkpoint can reconstruct the table without them (the safety
//! threshold), and the *next* version's first artifact is older than the
//! cutoff, so readers near the horizon still see a coherent history. The
//! second condition requires lookahead, so the planner buffers exactly one
//! version of input and decides at each version boundary.
//!
//! States: `Empty → Buffering(v) → Buffering(v') | Exhausted`, emitting or
//! discarding the buffer at each transition. End of input never emits; the
//! last buffered version has no witness.

use crate::listing::LogEntry;

#[derive(Debug)]
pub struct ExpiryPlanner {
    cutoff_millis: i64,
    threshold_version: u64,
    buffered_version: Option<u64>,
    buffer: Vec<LogEntry>,
}

impl ExpiryPlanner {
    /// `threshold_version` is the highest version eligible for deletion,
    /// i.e. latest checkpoint version minus one.
    pub fn new(cutoff_millis: i64, threshold_version: u64) -> Self {
        Self {
            cutoff_millis,
            threshold_version,
            buffered_version: None,
            buffer: Vec::new(),
        }
    }

    /// Feed the next artifact in listing order; returns artifacts that are
    /// now known safe to delete. Entries without a version are ignored.
    pub fn observe(&mut self, entry: LogEntry) -> Vec<LogEntry> {
        let Some(version) = entry.version() else {
            return Vec::new();
        };
        match self.buffered_version {
            Some(buffered) if buffered == version => {
                self.buffer.push(entry);
                Vec::new()
            }
            Some(buffered) => {
                let witness_expired = entry.modified_millis() <= self.cutoff_millis;
                let emitted = if buffered <= self.threshold_version && witness_expired {
                    std::mem::take(&mut self.buffer)
                } else {
                    self.buffer.clear();
                    Vec::new()
                };
                self.buffered_version = Some(version);
                self.buffer.push(entry);
                emitted
            }
            None => {
                self.buffered_version = Some(version);
                self.buffer.push(entry);
                Vec::new()
            }
        }
    }

    /// Once the buffered version is past the threshold nothing further can
    /// be emitted; callers may stop feeding the listing.
    pub fn beyond_threshold(&self) -> bool {
        matches!(self.buffered_version, Some(v) if v > self.threshold_version)
    }

    /// Terminal flush: the last buffered version never has a witness, so
    /// nothing is emitted.
    pub fn finish(self) -> Vec<LogEntry> {
        Vec::new()
    }
}
