//! Vision Layer
//!
//! Plate detection and text recognition are provided by external models.
//! This module defines the seams they plug into:
//! - [`PlateDetector`] returns plate bounding boxes for a frame
//! - [`OcrEngine`] returns text fragments for a preprocessed plate crop
//!
//! It also holds plate preprocessing, box annotation and the replay backends
//! that serve recorded detections and OCR output.

pub mod annotate;
pub mod ocr;
pub mod preprocess;
pub mod replay;

pub use annotate::draw_detections;
pub use ocr::{OcrEngine, OcrFragment, PlateCrop};
pub use preprocess::{PlatePreprocessor, PreprocessConfig};
pub use replay::{AnnotationStore, ReplayDetector, ReplayOcr};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::capture::CapturedFrame;

/// Axis-aligned box in pixel coordinates; `x2`/`y2` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Create a box from its corners
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Clamp to a `width` x `height` frame; `None` if nothing remains
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let clamped = Self {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        };
        (clamped.area() > 0).then_some(clamped)
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &Self) -> f32 {
        let ix = self.x2.min(other.x2).saturating_sub(self.x1.max(other.x1)) as u64;
        let iy = self.y2.min(other.y2).saturating_sub(self.y1.max(other.y1)) as u64;
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }
}

/// A plate detected in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Plate location
    pub bbox: BoundingBox,
    /// Model class index
    pub class_id: u32,
    /// Model class name
    pub label: String,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Confidence and IoU thresholds passed to the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    /// Minimum confidence for a box to be kept
    pub confidence: f32,
    /// Overlap above which the weaker of two boxes is suppressed
    pub iou: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou: 0.5,
        }
    }
}

/// A pretrained plate detector
pub trait PlateDetector: Send {
    /// Detect plates in a frame
    fn detect(
        &mut self,
        frame: &CapturedFrame,
        thresholds: &DetectionThresholds,
    ) -> Result<Vec<Detection>>;
}

/// Drop low-confidence boxes, then suppress overlapping boxes of the same class
pub fn filter_detections(
    mut detections: Vec<Detection>,
    thresholds: &DetectionThresholds,
) -> Vec<Detection> {
    detections.retain(|d| d.confidence >= thresholds.confidence);
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > thresholds.iou);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
