//! OCR (Optical Character Recognition) seam
//!
//! The recognizer itself is an external model; the pipeline only needs the
//! text fragments it reads from a plate crop.

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::BoundingBox;

/// Single recognized text fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrFragment {
    /// Recognized text, possibly with noise characters
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: f32,
}

impl OcrFragment {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Preprocessed plate image handed to the OCR engine
#[derive(Debug, Clone)]
pub struct PlateCrop {
    /// Binarized plate image
    pub image: GrayImage,
    /// Sequence number of the source frame
    pub frame_sequence: u64,
    /// Label of the source frame
    pub frame_label: Option<String>,
    /// Location of the plate in the source frame
    pub region: BoundingBox,
}

/// Text recognizer for plate crops
pub trait OcrEngine: Send {
    /// Read text fragments from a crop. An empty list means nothing was read.
    fn recognize(&mut self, crop: &PlateCrop) -> Result<Vec<OcrFragment>>;
}
