//! Save/process gate
//!
//! A plate stays in view for many consecutive frames. The gate lets one
//! detection through per interval so the crop is saved, read and logged once
//! instead of on every frame. It throttles by wall-clock time only: a second
//! plate arriving right after the first one was saved is dropped as well.
//!
//! The interval is timed from the start of the capture session, so nothing
//! passes during the first interval.

use std::time::{Duration, Instant};

/// Interval between accepted saves
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Time-interval debounce for plate saves
#[derive(Debug, Clone)]
pub struct SaveGate {
    interval: Duration,
    last_saved: Instant,
    saved_count: u64,
}

impl SaveGate {
    /// Create a gate for a session that started at `session_start`
    pub fn new(interval: Duration, session_start: Instant) -> Self {
        Self {
            interval,
            last_saved: session_start,
            saved_count: 0,
        }
    }

    /// Try to accept a detection seen at `now`.
    ///
    /// On acceptance the zero-based save index is returned and the gate
    /// advances; otherwise the gate is left untouched.
    pub fn try_accept(&mut self, now: Instant) -> Option<u64> {
        if now.saturating_duration_since(self.last_saved) < self.interval {
            return None;
        }

        let index = self.saved_count;
        self.last_saved = now;
        self.saved_count += 1;
        Some(index)
    }

    /// Number of accepted saves so far
    pub fn saved_count(&self) -> u64 {
        self.saved_count
    }
}
