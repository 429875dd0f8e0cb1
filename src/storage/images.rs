//! Detected plate image sink

use image::GrayImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StorageError;

/// Directory of sequentially numbered plate crops
#[derive(Debug, Clone)]
pub struct ImageSink {
    dir: PathBuf,
}

impl ImageSink {
    /// Open the sink, creating the directory if needed
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path used for the crop with the given save index
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("license_plate_{index}.jpg"))
    }

    /// Write a crop under its save index
    pub fn save(&self, index: u64, image: &GrayImage) -> Result<PathBuf, StorageError> {
        let path = self.path_for(index);
        image.save(&path).map_err(|source| StorageError::Image {
            path: path.clone(),
            source,
        })?;
        debug!("Saved plate crop {:?}", path);
        Ok(path)
    }
}
