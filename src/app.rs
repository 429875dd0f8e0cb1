//! Application Coordinator
//!
//! Builds the capture worker from configuration, owns the worker thread and
//! the channels it publishes on, and stops it on shutdown.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::capture::ImageDirSource;
use crate::config::AppConfig;
use crate::pipeline::{latest_channel, CaptureWorker, PlateProcessor, WorkerOutputs, WorkerParts};
use crate::plate::{PlateTextNormalizer, SaveGate};
use crate::shared::{FrameUpdate, SessionState, SharedSessionState, WorkerEvent};
use crate::storage::{ImageSink, PlateLog};
use crate::vision::{AnnotationStore, PlatePreprocessor, ReplayDetector, ReplayOcr};

/// Main application coordinator
pub struct PlateReaderApp {
    /// Session state shared with the worker
    pub state: SharedSessionState,
    /// Latest annotated frame
    pub frames: Receiver<FrameUpdate>,
    /// Worker events
    pub events: Receiver<WorkerEvent>,
    /// Plate log, for the display table
    log: PlateLog,
    worker: Option<CaptureWorker>,
}

impl PlateReaderApp {
    /// Initialize outputs and start the capture worker with the given parts
    pub fn start(parts: WorkerParts) -> Result<Self> {
        let log = parts.processor.log().clone();
        let state = SessionState::shared();
        let (frame_tx, frames) = latest_channel();
        let (event_tx, events) = unbounded();

        let worker = CaptureWorker::spawn(
            parts,
            WorkerOutputs {
                frames: frame_tx,
                events: event_tx,
                state: state.clone(),
            },
        )?;
        info!("Capture worker started");

        Ok(Self {
            state,
            frames,
            events,
            log,
            worker: Some(worker),
        })
    }

    /// Start a replay session: frames from `source_dir`, recorded detections
    /// and OCR output from the annotation directory
    pub fn start_replay(config: &AppConfig, source_dir: &Path) -> Result<Self> {
        let parts = build_replay_parts(config, source_dir)?;
        Self::start(parts)
    }

    pub fn log(&self) -> &PlateLog {
        &self.log
    }

    /// Check if the worker is still running
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    /// Stop the worker and wait for it to release the frame source
    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            info!("Stopping capture worker...");
            worker.stop();
        }
    }
}

impl Drop for PlateReaderApp {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open outputs and replay collaborators for a capture session
pub fn build_replay_parts(config: &AppConfig, source_dir: &Path) -> Result<WorkerParts> {
    let log = PlateLog::open(&config.storage.log_path)
        .with_context(|| format!("Failed to open plate log {:?}", config.storage.log_path))?;
    let images = ImageSink::open(&config.storage.detected_dir).with_context(|| {
        format!("Failed to open image directory {:?}", config.storage.detected_dir)
    })?;
    info!("Logging plates to {:?}, crops to {:?}", log.path(), images.dir());

    let source = ImageDirSource::open(source_dir, config.capture.to_capture_config())
        .context("Failed to open frame source")?;
    if source.is_empty() {
        warn!("No frames found in {:?}", source_dir);
    }

    let annotations_dir = config
        .detection
        .annotations_dir
        .as_deref()
        .unwrap_or(source_dir);
    let store = Arc::new(AnnotationStore::new(annotations_dir));

    let processor = PlateProcessor::new(
        SaveGate::new(config.gate.save_interval(), Instant::now()),
        PlatePreprocessor::new(config.preprocessing.to_preprocess_config()),
        Box::new(ReplayOcr::new(store.clone())),
        PlateTextNormalizer::default(),
        log,
        images,
    );

    Ok(WorkerParts {
        source: Box::new(source),
        detector: Box::new(ReplayDetector::new(store)),
        processor,
        thresholds: config.detection.thresholds(),
    })
}
