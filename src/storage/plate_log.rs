//! Plate log file
//!
//! Single-column text file with a `PlateNumber` header and one plate per
//! line. Every append reopens the file so rows reach disk immediately and a
//! reader can pick them up between writes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::StorageError;
use crate::plate::ValidatedPlate;

/// Header line of the plate log
pub const LOG_HEADER: &str = "PlateNumber";

/// Append-only plate log
#[derive(Debug, Clone)]
pub struct PlateLog {
    path: PathBuf,
}

impl PlateLog {
    /// Open the log, creating it with its header if it does not exist
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        if !path.exists() {
            std::fs::write(path, format!("{LOG_HEADER}\n"))
                .map_err(|e| StorageError::io(path, e))?;
            info!("Created plate log {:?}", path);
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one plate as a new row
    pub fn append(&self, plate: &ValidatedPlate) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;
        writeln!(file, "{}", plate.as_str()).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }

    /// Up to `limit` most recent plates, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))?;

        let rows: Vec<&str> = content
            .lines()
            .skip(1) // header
            .filter(|line| !line.trim().is_empty())
            .collect();

        Ok(rows
            .iter()
            .rev()
            .take(limit)
            .map(|row| row.to_string())
            .collect())
    }
}
