//! Display Consumer
//!
//! Consumer side of the capture worker: keeps the newest annotated frame and
//! a table of recently logged plates that is re-read from the plate log on a
//! fixed period.

use crossbeam_channel::Receiver;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::shared::FrameUpdate;
use crate::storage::{PlateLog, StorageError};

/// Default table refresh period
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of table rows
pub const DEFAULT_RECENT_ROWS: usize = 15;

/// Recently logged plates, newest first
#[derive(Debug, Clone)]
pub struct RecentPlatesTable {
    rows: Vec<String>,
    limit: usize,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl RecentPlatesTable {
    pub fn new(limit: usize, refresh_interval: Duration) -> Self {
        Self {
            rows: Vec::new(),
            limit,
            refresh_interval,
            last_refresh: None,
        }
    }

    /// Whether a refresh period has passed since the last refresh
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_refresh
            .map(|last| now.saturating_duration_since(last) >= self.refresh_interval)
            .unwrap_or(true)
    }

    /// Re-read the newest rows from the log
    pub fn refresh(&mut self, log: &PlateLog, now: Instant) -> Result<&[String], StorageError> {
        self.last_refresh = Some(now);
        self.rows = log.recent(self.limit)?;
        debug!("Plate table refreshed: {} rows", self.rows.len());
        Ok(&self.rows)
    }

    /// Refresh only when due; returns whether the table was re-read
    pub fn refresh_if_due(&mut self, log: &PlateLog, now: Instant) -> Result<bool, StorageError> {
        if !self.is_due(now) {
            return Ok(false);
        }
        self.refresh(log, now)?;
        Ok(true)
    }

    /// Render as a fixed-height text table
    pub fn render(&self) -> String {
        let mut out = String::from("Plate\n");
        out.push_str("----------------\n");
        for i in 0..self.limit {
            if let Some(row) = self.rows.get(i) {
                out.push_str(row);
            }
            out.push('\n');
        }
        out
    }
}

impl Default for RecentPlatesTable {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_ROWS, DEFAULT_REFRESH_INTERVAL)
    }
}

/// Latest annotated frame received from the worker
#[derive(Debug, Default)]
pub struct FrameView {
    latest: Option<FrameUpdate>,
    frames_received: u64,
}

impl FrameView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take whatever is pending on the frame channel, keeping the newest
    pub fn poll(&mut self, frames: &Receiver<FrameUpdate>) -> bool {
        let mut updated = false;
        for update in frames.try_iter() {
            self.accept(update);
            updated = true;
        }
        updated
    }

    /// Block up to `timeout` for the next frame
    pub fn wait(&mut self, frames: &Receiver<FrameUpdate>, timeout: Duration) -> bool {
        match frames.recv_timeout(timeout) {
            Ok(update) => {
                self.accept(update);
                true
            }
            Err(_) => false,
        }
    }

    fn accept(&mut self, update: FrameUpdate) {
        self.frames_received += 1;
        self.latest = Some(update);
    }

    pub fn latest(&self) -> Option<&FrameUpdate> {
        self.latest.as_ref()
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Write the latest frame to an image file
    pub fn save_preview(&self, path: &Path) -> Result<bool, StorageError> {
        let Some(update) = &self.latest else {
            return Ok(false);
        };
        update
            .image
            .save(path)
            .map_err(|source| StorageError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(true)
    }
}
