//! Plate crop preprocessing for OCR
//!
//! Grayscale crops are upscaled, denoised with an edge-preserving bilateral
//! filter, binarized with Otsu's threshold, sharpened and cleaned up with a
//! dilate/erode pass before they reach the recognizer.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::filter3x3;
use imageproc::morphology::{dilate, erode};
use tracing::debug;

/// 5 at the centre, -1 on the four direct neighbours
const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    /// Integer upscale factor (1 = no change)
    pub scale: u32,
    /// Bilateral filter neighbourhood diameter in pixels (0 disables)
    pub bilateral_diameter: u32,
    /// Bilateral filter intensity sigma
    pub sigma_color: f32,
    /// Bilateral filter spatial sigma
    pub sigma_space: f32,
    /// Apply the 3x3 sharpen kernel after binarization
    pub sharpen: bool,
    /// Apply a 3x3 dilate followed by erode
    pub morphology: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            scale: 2,
            bilateral_diameter: 13,
            sigma_color: 15.0,
            sigma_space: 15.0,
            sharpen: true,
            morphology: true,
        }
    }
}

/// Plate crop preprocessor
#[derive(Debug, Clone, Default)]
pub struct PlatePreprocessor {
    config: PreprocessConfig,
}

impl PlatePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the full preprocessing chain on a grayscale crop
    pub fn process(&self, crop: &GrayImage) -> GrayImage {
        let (width, height) = crop.dimensions();
        if width == 0 || height == 0 {
            return crop.clone();
        }

        let scaled = if self.config.scale > 1 {
            imageops::resize(
                crop,
                width * self.config.scale,
                height * self.config.scale,
                FilterType::CatmullRom,
            )
        } else {
            crop.clone()
        };

        let denoised = if self.config.bilateral_diameter > 1 {
            bilateral_filter(
                &scaled,
                self.config.bilateral_diameter,
                self.config.sigma_color,
                self.config.sigma_space,
            )
        } else {
            scaled
        };

        let level = otsu_level(&denoised);
        let mut binary = threshold(&denoised, level, ThresholdType::Binary);

        if self.config.sharpen {
            binary = filter3x3::<_, i32, u8>(&binary, &SHARPEN_KERNEL);
        }

        if self.config.morphology {
            binary = erode(&dilate(&binary, Norm::LInf, 1), Norm::LInf, 1);
        }

        debug!(
            "Preprocessed plate crop {}x{} -> {}x{} (otsu level {})",
            width,
            height,
            binary.width(),
            binary.height(),
            level
        );

        binary
    }
}

/// Mirror an out-of-range coordinate back into `0..len` without repeating the edge
fn reflect(pos: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let mut p = pos;
    while p < 0 || p >= len {
        if p < 0 {
            p = -p;
        }
        if p >= len {
            p = 2 * (len - 1) - p;
        }
    }
    p as u32
}

/// Edge-preserving smoothing over a circular neighbourhood.
///
/// Borders are mirrored without repeating the edge pixel, and a uniform black
/// input stays black.
fn bilateral_filter(image: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    let radius = (diameter / 2) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let color_weights: Vec<f32> = (0..256)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    // (dx, dy, spatial weight) for offsets inside the circle
    let mut kernel = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist2 = (dx * dx + dy * dy) as f32;
            if dist2.sqrt() > radius as f32 {
                continue;
            }
            kernel.push((dx, dy, (dist2 * space_coeff).exp()));
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let center = image.get_pixel(x, y).0[0];
            let mut sum = 0.0f32;
            let mut norm = 0.0f32;

            for &(dx, dy, spatial) in &kernel {
                let sx = reflect(x as i64 + dx, w);
                let sy = reflect(y as i64 + dy, h);
                let value = image.get_pixel(sx, sy).0[0];
                let weight = spatial * color_weights[center.abs_diff(value) as usize];
                sum += value as f32 * weight;
                norm += weight;
            }

            let filtered = if norm > 0.0 { sum / norm } else { center as f32 };
            out.put_pixel(x, y, Luma([filtered.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}
