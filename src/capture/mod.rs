//! Camera Capture Layer
//!
//! Frame sources feed BGR frames into the capture worker. A camera driver or
//! the image-directory replay source implement [`FrameSource`].

pub mod frame;
pub mod replay;

pub use frame::CapturedFrame;
pub use replay::ImageDirSource;

use std::path::PathBuf;
use thiserror::Error;

/// Frame source configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Requested frame width in pixels
    pub frame_width: u32,
    /// Requested frame height in pixels
    pub frame_height: u32,
    /// Maximum frames per second to deliver (0 = unpaced)
    pub max_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            max_fps: 30,
        }
    }
}

/// Frame capture failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame source {0:?} does not exist or is not a directory")]
    SourceNotFound(PathBuf),
    #[error("failed to list frame source {path:?}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame source is closed")]
    Closed,
}

/// A source of camera frames.
///
/// `Ok(None)` means the source has ended and the capture loop should stop;
/// an error only skips the current cycle.
pub trait FrameSource: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;

    /// Whether the source can still deliver frames
    fn is_open(&self) -> bool;

    /// Release the underlying device
    fn release(&mut self);

    /// Human readable description for logs
    fn describe(&self) -> String;
}
