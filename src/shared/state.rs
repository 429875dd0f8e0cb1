//! Session state shared between the capture worker and the display

use parking_lot::RwLock;
use std::sync::Arc;

/// Shared handle to the session state
pub type SharedSessionState = Arc<RwLock<SessionState>>;

/// Runtime state of a capture session (not persisted)
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Whether the capture worker is running
    pub is_capturing: bool,
    /// Description of the frame source
    pub source: Option<String>,
    /// Frames read successfully
    pub frames_read: u64,
    /// Frame reads that failed and were skipped
    pub read_failures: u64,
    /// Plate boxes reported by the detector
    pub detections: u64,
    /// Detections that passed the save gate
    pub saves: u64,
    /// Plates appended to the log
    pub plates_logged: u64,
    /// Last plate appended to the log
    pub last_plate: Option<String>,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl SessionState {
    /// Create a new shared state handle
    pub fn shared() -> SharedSessionState {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "frames={} read_failures={} detections={} saves={} plates={}",
            self.frames_read, self.read_failures, self.detections, self.saves, self.plates_logged
        )
    }
}
