//! Image directory frame source
//!
//! Replays a directory of still images as a camera stream, in file name
//! order, at the configured resolution and frame rate.

use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{CaptureConfig, CaptureError, CapturedFrame, FrameSource};

/// File extensions picked up as frames
const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Frame source backed by a directory of images
pub struct ImageDirSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
    config: CaptureConfig,
    last_read: Option<Instant>,
    open: bool,
}

impl ImageDirSource {
    /// Open a directory of frames
    pub fn open(dir: &Path, config: CaptureConfig) -> Result<Self, CaptureError> {
        if !dir.is_dir() {
            return Err(CaptureError::SourceNotFound(dir.to_path_buf()));
        }

        let frames = list_frames(dir)?;
        info!(
            "Opened frame source {:?}: {} frames at {}x{}",
            dir,
            frames.len(),
            config.frame_width,
            config.frame_height
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            frames,
            next: 0,
            config,
            last_read: None,
            open: true,
        })
    }

    /// Number of frames in the directory
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the directory holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pace(&mut self) {
        if self.config.max_fps == 0 {
            return;
        }
        let frame_interval = Duration::from_secs_f64(1.0 / self.config.max_fps as f64);
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < frame_interval {
                std::thread::sleep(frame_interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

impl FrameSource for ImageDirSource {
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        let Some(path) = self.frames.get(self.next).cloned() else {
            debug!("Frame source {:?} exhausted", self.dir);
            self.open = false;
            return Ok(None);
        };
        let sequence = self.next as u64;
        self.next += 1;
        self.pace();

        let decoded = image::open(&path).map_err(|source| CaptureError::Decode {
            path: path.clone(),
            source,
        })?;

        let (w, h) = (self.config.frame_width, self.config.frame_height);
        let rgb = if decoded.width() != w || decoded.height() != h {
            decoded.resize_exact(w, h, FilterType::Triangle).to_rgb8()
        } else {
            decoded.to_rgb8()
        };

        let mut frame = CapturedFrame::from_rgb(&rgb, sequence);
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            frame = frame.with_label(stem);
        }
        Ok(Some(frame))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) {
        if self.open {
            info!("Releasing frame source {:?}", self.dir);
        }
        self.open = false;
    }

    fn describe(&self) -> String {
        format!("image directory {} ({} frames)", self.dir.display(), self.len())
    }
}

/// Sorted list of image files in a directory
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CaptureError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    Ok(frames)
}
