//! Recorded detector and OCR backends
//!
//! Each replayed frame `<stem>.<ext>` may have a sidecar `<stem>.json` holding
//! the detector boxes and OCR fragments recorded for it:
//!
//! ```json
//! {"detections": [{"bbox": [120, 300, 260, 340], "class_id": 0,
//!   "label": "plate", "confidence": 0.91,
//!   "fragments": [{"text": "B 1234", "confidence": 0.97}]}]}
//! ```
//!
//! A frame without a sidecar has no detections.

use anyhow::Result;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    filter_detections, BoundingBox, Detection, DetectionThresholds, OcrEngine, OcrFragment,
    PlateCrop, PlateDetector,
};
use crate::capture::CapturedFrame;

/// Cached annotations kept before the cache is reset
const MAX_CACHED_FRAMES: usize = 64;

/// Replay annotation failures
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read annotation {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid annotation {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Recorded model output for one frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameAnnotation {
    #[serde(default)]
    pub detections: Vec<AnnotatedDetection>,
}

/// One recorded plate box with its OCR output
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotatedDetection {
    /// `[x1, y1, x2, y2]`
    pub bbox: [u32; 4],
    #[serde(default)]
    pub class_id: u32,
    #[serde(default = "default_label")]
    pub label: String,
    pub confidence: f32,
    #[serde(default)]
    pub fragments: Vec<OcrFragment>,
}

fn default_label() -> String {
    "plate".to_string()
}

impl AnnotatedDetection {
    pub fn bounding_box(&self) -> BoundingBox {
        let [x1, y1, x2, y2] = self.bbox;
        BoundingBox::new(x1, y1, x2, y2)
    }

    fn to_detection(&self) -> Detection {
        Detection {
            bbox: self.bounding_box(),
            class_id: self.class_id,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }
}

/// Loads and caches sidecar annotations, shared by the replay backends
pub struct AnnotationStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<FrameAnnotation>>>,
}

impl AnnotationStore {
    /// Annotations are looked up in `dir`
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Annotation for a frame label; missing sidecars yield an empty annotation
    pub fn get(&self, label: &str) -> Result<Arc<FrameAnnotation>, ReplayError> {
        if let Some(cached) = self.cache.lock().get(label) {
            return Ok(cached.clone());
        }

        let path = self.dir.join(format!("{label}.json"));
        let annotation: FrameAnnotation = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ReplayError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| ReplayError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            debug!("No annotation for frame '{}'", label);
            FrameAnnotation::default()
        };

        let annotation = Arc::new(annotation);
        let mut cache = self.cache.lock();
        if cache.len() >= MAX_CACHED_FRAMES {
            cache.clear();
        }
        cache.insert(label.to_string(), annotation.clone());
        Ok(annotation)
    }
}

/// Detector serving recorded boxes
pub struct ReplayDetector {
    store: Arc<AnnotationStore>,
}

impl ReplayDetector {
    pub fn new(store: Arc<AnnotationStore>) -> Self {
        Self { store }
    }
}

impl PlateDetector for ReplayDetector {
    fn detect(
        &mut self,
        frame: &CapturedFrame,
        thresholds: &DetectionThresholds,
    ) -> Result<Vec<Detection>> {
        let Some(label) = frame.label.as_deref() else {
            warn!("Frame {} has no label, nothing to replay", frame.sequence);
            return Ok(vec![]);
        };

        let annotation = self.store.get(label)?;
        let detections = annotation
            .detections
            .iter()
            .map(AnnotatedDetection::to_detection)
            .collect();

        Ok(filter_detections(detections, thresholds))
    }
}

/// OCR engine serving recorded fragments, matched by frame label and box
pub struct ReplayOcr {
    store: Arc<AnnotationStore>,
}

impl ReplayOcr {
    pub fn new(store: Arc<AnnotationStore>) -> Self {
        Self { store }
    }
}

impl OcrEngine for ReplayOcr {
    fn recognize(&mut self, crop: &PlateCrop) -> Result<Vec<OcrFragment>> {
        let Some(label) = crop.frame_label.as_deref() else {
            return Ok(vec![]);
        };

        let annotation = self.store.get(label)?;
        let fragments = annotation
            .detections
            .iter()
            .find(|d| d.bounding_box() == crop.region)
            .map(|d| d.fragments.clone())
            .unwrap_or_default();
        debug!(
            "Replayed {} OCR fragment(s) for frame {} region {:?}",
            fragments.len(),
            crop.frame_sequence,
            crop.region
        );
        Ok(fragments)
    }
}
