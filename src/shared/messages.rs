//! Message types sent from the capture worker to the display consumer

use image::RgbImage;
use std::path::PathBuf;

use crate::plate::ValidatedPlate;
use crate::vision::Detection;

/// Annotated frame ready for display
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    /// Frame sequence number
    pub sequence: u64,
    /// RGB frame with detection boxes drawn
    pub image: RgbImage,
    /// Detections drawn on the frame
    pub detections: Vec<Detection>,
}

/// Events emitted by the capture worker
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A plate validated and was appended to the log
    PlateRecorded {
        save_index: u64,
        plate: ValidatedPlate,
        image_path: Option<PathBuf>,
    },
    /// A saved crop produced no valid plate text
    PlateRejected {
        save_index: u64,
        raw_text: String,
    },
    /// Writing the log or a crop image failed
    SinkFailed(String),
    /// The worker loop has exited
    Stopped,
}
