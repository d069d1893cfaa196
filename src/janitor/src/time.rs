//! Cutoff truncation to UTC bucket boundaries.
//!
//! The retention cutoff is not `now - retention` but that instant truncated
//! to the start of its UTC bucket. Deletions therefore only advance when a
//! bucket boundary passes, which keeps repeated runs from thrashing
//! checkpoint creation near the horizon.

const MILLIS_PER_MINUTE: i64 = 60 * 1_000;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TruncationGranularity {
    Day,
    Hour,
    Minute,
}

impl TruncationGranularity {
    fn bucket_millis(self) -> i64 {
        match self {
            TruncationGranularity::Day => MILLIS_PER_DAY,
            TruncationGranularity::Hour => MILLIS_PER_HOUR,
            TruncationGranularity::Minute => MILLIS_PER_MINUTE,
        }
    }
}

/// Start of the UTC bucket containing `epoch_millis`. `Day` truncates to the
/// previous midnight UTC; instants before the epoch round toward minus
/// infinity, not toward zero.
pub fn truncate_millis(epoch_millis: i64, granularity: TruncationGranularity) -> i64 {
    epoch_millis - epoch_millis.rem_euclid(granularity.bucket_millis())
}
