//! Frame data structures for captured camera content

use image::{GrayImage, Luma, RgbImage};
use std::time::Instant;

use crate::vision::BoundingBox;

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw BGR pixel data, row-major, 3 bytes per pixel
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Position of the frame in the capture session
    pub sequence: u64,
    /// Source name of the frame (file stem for replayed frames)
    pub label: Option<String>,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame from BGR data
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            label: None,
            timestamp: Instant::now(),
        }
    }

    /// Create a BGR frame from an RGB image
    pub fn from_rgb(image: &RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.as_raw().clone();
        for chunk in data.chunks_exact_mut(3) {
            chunk.swap(0, 2); // Swap R and B
        }
        Self::new(data, width, height, sequence)
    }

    /// Attach a source label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// BGR value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Crop a region and convert it to grayscale.
    ///
    /// The box is clamped to the frame; `None` if nothing is left.
    pub fn crop_gray(&self, bbox: &BoundingBox) -> Option<GrayImage> {
        let clamped = bbox.clamp_to(self.width, self.height)?;
        let (w, h) = (clamped.width(), clamped.height());

        let mut crop = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let Some([b, g, r]) = self.pixel(clamped.x1 + x, clamped.y1 + y) else {
                    continue;
                };
                // Standard luminance weights
                let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                crop.put_pixel(x, y, Luma([gray.round().clamp(0.0, 255.0) as u8]));
            }
        }

        Some(crop)
    }

    /// Convert to an RGB image for display
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut rgb = self.data.clone();
        for chunk in rgb.chunks_exact_mut(3) {
            chunk.swap(0, 2);
        }
        // Short buffers are padded so the image is always well formed
        rgb.resize(self.width as usize * self.height as usize * 3, 0);
        RgbImage::from_raw(self.width, self.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}
