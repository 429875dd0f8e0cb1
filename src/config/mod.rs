//! Application Configuration
//!
//! User settings stored in TOML format. Every field has a default, so a
//! config file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::plate::DEFAULT_SAVE_INTERVAL;
use crate::vision::{DetectionThresholds, PreprocessConfig};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture settings
    pub capture: CaptureSettings,
    /// Detector settings
    pub detection: DetectionSettings,
    /// Save gate settings
    pub gate: GateSettings,
    /// Output file settings
    pub storage: StorageSettings,
    /// Plate table settings
    pub display: DisplaySettings,
    /// Plate crop preprocessing settings
    pub preprocessing: PreprocessSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Directory of frames to replay
    pub source_dir: Option<PathBuf>,
    /// Requested frame width
    pub frame_width: u32,
    /// Requested frame height
    pub frame_height: u32,
    /// Maximum capture FPS (0 = unpaced)
    pub max_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source_dir: None,
            frame_width: 640,
            frame_height: 480,
            max_fps: 30,
        }
    }
}

impl CaptureSettings {
    pub fn to_capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            max_fps: self.max_fps,
        }
    }
}

/// Detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum box confidence
    pub confidence_threshold: f32,
    /// IoU threshold for overlap suppression
    pub iou_threshold: f32,
    /// Directory of recorded annotations (defaults to the source directory)
    pub annotations_dir: Option<PathBuf>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.5,
            annotations_dir: None,
        }
    }
}

impl DetectionSettings {
    pub fn thresholds(&self) -> DetectionThresholds {
        DetectionThresholds {
            confidence: self.confidence_threshold,
            iou: self.iou_threshold,
        }
    }
}

/// Save gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Minimum seconds between processed detections, also timed from
    /// session start
    pub save_interval_secs: f64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            save_interval_secs: DEFAULT_SAVE_INTERVAL.as_secs_f64(),
        }
    }
}

impl GateSettings {
    pub fn save_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.save_interval_secs).unwrap_or(Duration::ZERO)
    }
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Plate log file
    pub log_path: PathBuf,
    /// Directory for preprocessed plate crops
    pub detected_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("plates.csv"),
            detected_dir: PathBuf::from("detected"),
        }
    }
}

/// Plate table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Seconds between plate table refreshes
    pub refresh_interval_secs: u64,
    /// Number of plates shown
    pub recent_rows: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            recent_rows: 15,
        }
    }
}

impl DisplaySettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Plate crop preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Upscale factor
    pub scale: u32,
    /// Bilateral filter diameter (0 disables)
    pub bilateral_diameter: u32,
    /// Bilateral filter intensity sigma
    pub sigma_color: f32,
    /// Bilateral filter spatial sigma
    pub sigma_space: f32,
    /// Sharpen after binarization
    pub sharpen: bool,
    /// Dilate/erode cleanup
    pub morphology: bool,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        let defaults = PreprocessConfig::default();
        Self {
            scale: defaults.scale,
            bilateral_diameter: defaults.bilateral_diameter,
            sigma_color: defaults.sigma_color,
            sigma_space: defaults.sigma_space,
            sharpen: defaults.sharpen,
            morphology: defaults.morphology,
        }
    }
}

impl PreprocessSettings {
    pub fn to_preprocess_config(&self) -> PreprocessConfig {
        PreprocessConfig {
            scale: self.scale.max(1),
            bilateral_diameter: self.bilateral_diameter,
            sigma_color: self.sigma_color,
            sigma_space: self.sigma_space,
            sharpen: self.sharpen,
            morphology: self.morphology,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
