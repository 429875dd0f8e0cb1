//! Per-detection plate processing
//!
//! For every detected plate box: crop, gate, preprocess, save the crop, run
//! OCR, normalize the text and append valid plates to the log. The gate is
//! consulted before any work is done so throttled detections cost nothing.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::capture::CapturedFrame;
use crate::plate::{PlateReading, PlateTextNormalizer, SaveGate, ValidatedPlate};
use crate::storage::{ImageSink, PlateLog, StorageError};
use crate::vision::{Detection, OcrEngine, PlateCrop, PlatePreprocessor};

/// Result of a detection that passed the gate
#[derive(Debug)]
pub struct SaveReport {
    /// Zero-based save index, also used in the crop file name
    pub index: u64,
    /// Cleaned and joined OCR text before correction
    pub raw_text: String,
    /// Validated plate, if the text matched the grammar
    pub plate: Option<ValidatedPlate>,
    /// Whether the plate was appended to the log
    pub logged: bool,
    /// Where the preprocessed crop was written
    pub image_path: Option<PathBuf>,
    /// Write failures that occurred along the way
    pub failures: Vec<StorageError>,
}

/// What happened to a single detection
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The box lies outside the frame
    EmptyCrop,
    /// The save gate is still closed
    Throttled,
    /// The detection was saved and read
    Saved(SaveReport),
}

/// Plate processing stage owned by the capture worker
pub struct PlateProcessor {
    gate: SaveGate,
    preprocessor: PlatePreprocessor,
    ocr: Box<dyn OcrEngine>,
    normalizer: PlateTextNormalizer,
    log: PlateLog,
    images: ImageSink,
}

impl PlateProcessor {
    pub fn new(
        gate: SaveGate,
        preprocessor: PlatePreprocessor,
        ocr: Box<dyn OcrEngine>,
        normalizer: PlateTextNormalizer,
        log: PlateLog,
        images: ImageSink,
    ) -> Self {
        Self {
            gate,
            preprocessor,
            ocr,
            normalizer,
            log,
            images,
        }
    }

    /// Detections that passed the gate so far
    pub fn saved_count(&self) -> u64 {
        self.gate.saved_count()
    }

    pub fn log(&self) -> &PlateLog {
        &self.log
    }

    /// Process one detection seen at `now`
    pub fn process(&mut self, frame: &CapturedFrame, detection: &Detection, now: Instant) -> ProcessOutcome {
        let Some(gray) = frame.crop_gray(&detection.bbox) else {
            debug!("Detection {:?} is outside frame {}", detection.bbox, frame.sequence);
            return ProcessOutcome::EmptyCrop;
        };

        let Some(index) = self.gate.try_accept(now) else {
            return ProcessOutcome::Throttled;
        };

        let crop = PlateCrop {
            image: self.preprocessor.process(&gray),
            frame_sequence: frame.sequence,
            frame_label: frame.label.clone(),
            region: detection.bbox,
        };

        let mut failures = Vec::new();
        let image_path = match self.images.save(index, &crop.image) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to save plate crop {}: {}", index, e);
                failures.push(e);
                None
            }
        };

        let fragments = match self.ocr.recognize(&crop) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!("OCR failed on crop {}: {:#}", index, e);
                Vec::new()
            }
        };

        let PlateReading { raw_text, plate } = self.normalizer.normalize(&fragments);

        let mut logged = false;
        match &plate {
            Some(plate) => match self.log.append(plate) {
                Ok(()) => {
                    info!("Plate {} recorded (save {})", plate, index);
                    logged = true;
                }
                Err(e) => {
                    warn!("Failed to log plate {}: {}", plate, e);
                    failures.push(e);
                }
            },
            None => debug!("No valid plate in crop {} (read {:?})", index, raw_text),
        }

        ProcessOutcome::Saved(SaveReport {
            index,
            raw_text,
            plate,
            logged,
            image_path,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{BoundingBox, OcrFragment};
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tempfile::TempDir;

    /// OCR fake returning queued responses in order
    struct ScriptedOcr {
        responses: VecDeque<anyhow::Result<Vec<OcrFragment>>>,
    }

    impl ScriptedOcr {
        fn new(responses: Vec<anyhow::Result<Vec<OcrFragment>>>) -> Self {
            Self {
                responses: responses.into(),
            }
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&mut self, _crop: &PlateCrop) -> anyhow::Result<Vec<OcrFragment>> {
            self.responses.pop_front().unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn texts(items: &[&str]) -> anyhow::Result<Vec<OcrFragment>> {
        Ok(items.iter().map(|t| OcrFragment::new(*t, 0.9)).collect())
    }

    fn frame() -> CapturedFrame {
        CapturedFrame::new(vec![128; 64 * 32 * 3], 64, 32, 0).with_label("f000")
    }

    fn detection(bbox: BoundingBox) -> Detection {
        Detection {
            bbox,
            class_id: 0,
            label: "plate".to_string(),
            confidence: 0.9,
        }
    }

    const INTERVAL: Duration = Duration::from_secs(5);

    /// Processor whose session started at `start`; its gate opens at `start + INTERVAL`
    fn processor(dir: &TempDir, ocr: ScriptedOcr, start: Instant) -> PlateProcessor {
        PlateProcessor::new(
            SaveGate::new(INTERVAL, start),
            PlatePreprocessor::default(),
            Box::new(ocr),
            PlateTextNormalizer::default(),
            PlateLog::open(&dir.path().join("plates.csv")).unwrap(),
            ImageSink::open(&dir.path().join("detected")).unwrap(),
        )
    }

    fn log_rows(dir: &TempDir) -> String {
        std::fs::read_to_string(dir.path().join("plates.csv")).unwrap()
    }

    #[test]
    fn test_valid_plate_saved_and_logged() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![texts(&["B1234", "!!AB"])]), start);

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(4, 4, 40, 20)), start + INTERVAL);
        let ProcessOutcome::Saved(report) = outcome else {
            panic!("expected a save");
        };

        assert_eq!(report.index, 0);
        assert_eq!(report.raw_text, "B1234 AB");
        assert_eq!(report.plate.as_ref().map(|p| p.as_str()), Some("B1234 AB"));
        assert!(report.logged);
        assert!(report.failures.is_empty());
        assert!(dir.path().join("detected/license_plate_0.jpg").exists());
        assert_eq!(log_rows(&dir), "PlateNumber\nB1234 AB\n");
    }

    #[test]
    fn test_detection_at_session_start_throttled() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![texts(&["B1234"])]), start);
        let bbox = BoundingBox::new(4, 4, 40, 20);

        let early = proc.process(&frame(), &detection(bbox), start + Duration::from_secs(1));
        assert!(matches!(early, ProcessOutcome::Throttled));
        assert!(!dir.path().join("detected/license_plate_0.jpg").exists());
        assert_eq!(log_rows(&dir), "PlateNumber\n");

        let saved = proc.process(&frame(), &detection(bbox), start + INTERVAL);
        let ProcessOutcome::Saved(report) = saved else {
            panic!("expected a save");
        };
        assert_eq!(report.index, 0);
        assert_eq!(log_rows(&dir), "PlateNumber\nB1234\n");
    }

    #[test]
    fn test_throttled_detection_does_nothing() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(
            &dir,
            ScriptedOcr::new(vec![texts(&["B1234"]), texts(&["D 99"])]),
            start,
        );
        let bbox = BoundingBox::new(4, 4, 40, 20);
        let t0 = start + INTERVAL;

        assert!(matches!(proc.process(&frame(), &detection(bbox), t0), ProcessOutcome::Saved(_)));
        let second = proc.process(&frame(), &detection(bbox), t0 + Duration::from_secs(2));

        assert!(matches!(second, ProcessOutcome::Throttled));
        assert_eq!(proc.saved_count(), 1);
        assert!(!dir.path().join("detected/license_plate_1.jpg").exists());
        assert_eq!(log_rows(&dir), "PlateNumber\nB1234\n");
    }

    #[test]
    fn test_saves_after_interval() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(
            &dir,
            ScriptedOcr::new(vec![texts(&["B1234"]), texts(&["D99"])]),
            start,
        );
        let bbox = BoundingBox::new(4, 4, 40, 20);
        let t0 = start + INTERVAL;

        proc.process(&frame(), &detection(bbox), t0);
        let second = proc.process(&frame(), &detection(bbox), t0 + Duration::from_secs(6));

        let ProcessOutcome::Saved(report) = second else {
            panic!("expected a save");
        };
        assert_eq!(report.index, 1);
        assert_eq!(proc.saved_count(), 2);
        assert_eq!(log_rows(&dir), "PlateNumber\nB1234\nD99\n");
    }

    #[test]
    fn test_invalid_text_saves_image_but_not_log() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![texts(&["1234AB"])]), start);

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(4, 4, 40, 20)), start + INTERVAL);
        let ProcessOutcome::Saved(report) = outcome else {
            panic!("expected a save");
        };

        assert!(report.plate.is_none());
        assert!(!report.logged);
        assert!(report.image_path.is_some());
        assert_eq!(proc.saved_count(), 1);
        assert_eq!(log_rows(&dir), "PlateNumber\n");
    }

    #[test]
    fn test_ocr_failure_is_no_plate() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![Err(anyhow!("model crashed"))]), start);

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(4, 4, 40, 20)), start + INTERVAL);
        let ProcessOutcome::Saved(report) = outcome else {
            panic!("expected a save");
        };
        assert_eq!(report.raw_text, "");
        assert!(report.plate.is_none());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_empty_crop_leaves_gate_open() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![]), start);

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(100, 100, 120, 110)), start + INTERVAL);
        assert!(matches!(outcome, ProcessOutcome::EmptyCrop));
        assert_eq!(proc.saved_count(), 0);
    }

    #[test]
    fn test_image_write_failure_still_logs_plate() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![texts(&["B1234"])]), start);
        std::fs::remove_dir(dir.path().join("detected")).unwrap();

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(4, 4, 40, 20)), start + INTERVAL);
        let ProcessOutcome::Saved(report) = outcome else {
            panic!("expected a save");
        };

        assert!(report.image_path.is_none());
        assert_eq!(report.failures.len(), 1);
        assert!(report.logged);
        assert_eq!(log_rows(&dir), "PlateNumber\nB1234\n");
    }

    #[test]
    fn test_log_write_failure_reported() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut proc = processor(&dir, ScriptedOcr::new(vec![texts(&["B1234"])]), start);
        std::fs::remove_file(dir.path().join("plates.csv")).unwrap();

        let outcome = proc.process(&frame(), &detection(BoundingBox::new(4, 4, 40, 20)), start + INTERVAL);
        let ProcessOutcome::Saved(report) = outcome else {
            panic!("expected a save");
        };

        assert!(report.plate.is_some());
        assert!(!report.logged);
        assert!(matches!(report.failures.as_slice(), [StorageError::Io { .. }]));
    }
}
