//! Injectable wall clock.
//!
//! The retention cutoff is derived from "now", so the clock is a collaborator
//! rather than an ambient lookup. Production uses [`SystemClock`]; tests pin
//! time with [`FixedClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(epoch_millis: i64) -> Self {
        Self(AtomicI64::new(epoch_millis))
    }

    pub fn set(&self, epoch_millis: i64) {
        self.0.store(epoch_millis, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.0.fetch_add(delta_millis, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}
