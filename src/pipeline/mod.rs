//! Capture Pipeline
//!
//! The capture worker reads frames, runs the detector, hands every detection
//! to the [`PlateProcessor`] and publishes the annotated frame. It runs on its
//! own thread and is stopped through a cooperative flag checked once per
//! cycle. The frame source is released by the worker after its last cycle, so
//! joining the worker guarantees the device is no longer in use.

pub mod latest;
pub mod processor;

pub use latest::{latest_channel, LatestSender};
pub use processor::{PlateProcessor, ProcessOutcome};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::shared::{FrameUpdate, SharedSessionState, WorkerEvent};
use crate::vision::{draw_detections, DetectionThresholds, PlateDetector};

/// Everything the capture worker owns
pub struct WorkerParts {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn PlateDetector>,
    pub processor: PlateProcessor,
    pub thresholds: DetectionThresholds,
}

/// Output side of the capture worker
pub struct WorkerOutputs {
    pub frames: LatestSender<FrameUpdate>,
    pub events: Sender<WorkerEvent>,
    pub state: SharedSessionState,
}

/// Handle to a running capture worker
pub struct CaptureWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Start the capture loop on a dedicated thread
    pub fn spawn(parts: WorkerParts, outputs: WorkerOutputs) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || {
                info!("Capture worker starting...");
                run_capture_loop(parts, &stop_flag, &outputs);
                info!("Capture worker exiting...");
            })
            .context("Failed to spawn capture worker thread")?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the worker to stop after its current cycle
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Capture worker panicked");
            }
        }
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run detection cycles until stopped or the source ends
pub fn run_capture_loop(parts: WorkerParts, stop: &AtomicBool, outputs: &WorkerOutputs) {
    let WorkerParts {
        mut source,
        mut detector,
        mut processor,
        thresholds,
    } = parts;

    {
        let mut state = outputs.state.write();
        state.is_capturing = true;
        state.source = Some(source.describe());
    }

    while !stop.load(Ordering::SeqCst) && source.is_open() {
        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame source ended");
                break;
            }
            Err(e) => {
                debug!("Skipping cycle, frame read failed: {}", e);
                outputs.state.write().read_failures += 1;
                continue;
            }
        };
        outputs.state.write().frames_read += 1;

        let detections = match detector.detect(&frame, &thresholds) {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detector failed on frame {}: {:#}", frame.sequence, e);
                Vec::new()
            }
        };
        outputs.state.write().detections += detections.len() as u64;

        for detection in &detections {
            let outcome = processor.process(&frame, detection, frame.timestamp);
            report_outcome(outcome, outputs);
        }

        let mut image = frame.to_rgb_image();
        draw_detections(&mut image, &detections);
        outputs.frames.publish(FrameUpdate {
            sequence: frame.sequence,
            image,
            detections,
        });
    }

    source.release();
    info!("Capture loop finished after {} plate saves", processor.saved_count());
    outputs.state.write().is_capturing = false;
    let _ = outputs.events.send(WorkerEvent::Stopped);
}

fn report_outcome(outcome: ProcessOutcome, outputs: &WorkerOutputs) {
    let ProcessOutcome::Saved(report) = outcome else {
        return;
    };

    {
        let mut state = outputs.state.write();
        state.saves += 1;
        if report.logged {
            state.plates_logged += 1;
            state.last_plate = report.plate.as_ref().map(|p| p.as_str().to_owned());
        }
        match report.failures.last() {
            Some(last) => state.set_error(last.to_string()),
            None => state.clear_error(),
        }
    }

    for failure in &report.failures {
        let _ = outputs.events.send(WorkerEvent::SinkFailed(failure.to_string()));
    }

    let event = match report.plate {
        Some(plate) if report.logged => WorkerEvent::PlateRecorded {
            save_index: report.index,
            plate,
            image_path: report.image_path,
        },
        Some(_) => return,
        None => WorkerEvent::PlateRejected {
            save_index: report.index,
            raw_text: report.raw_text,
        },
    };
    let _ = outputs.events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, CapturedFrame};
    use crate::plate::{PlateTextNormalizer, SaveGate};
    use crate::pipeline::processor::SaveReport;
    use crate::shared::SessionState;
    use crate::storage::{ImageSink, PlateLog, StorageError};
    use crate::vision::{
        BoundingBox, Detection, OcrEngine, OcrFragment, PlateCrop, PlatePreprocessor,
    };
    use crossbeam_channel::{unbounded, Receiver};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Source replaying a fixed script of read results
    struct ScriptedSource {
        script: VecDeque<Result<Option<CapturedFrame>, CaptureError>>,
        open: bool,
        released: Arc<AtomicBool>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn release(&mut self) {
            self.open = false;
            self.released.store(true, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Source that never ends, for stop tests
    struct EndlessSource {
        reads: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl FrameSource for EndlessSource {
        fn read_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
            assert!(!self.released.load(Ordering::SeqCst), "read after release");
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            Ok(Some(CapturedFrame::new(vec![0; 4 * 4 * 3], 4, 4, n as u64)))
        }

        fn is_open(&self) -> bool {
            !self.released.load(Ordering::SeqCst)
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "endless".to_string()
        }
    }

    /// Detector reporting one fixed box on every frame
    struct FixedDetector(BoundingBox);

    impl PlateDetector for FixedDetector {
        fn detect(
            &mut self,
            _frame: &CapturedFrame,
            _thresholds: &DetectionThresholds,
        ) -> anyhow::Result<Vec<Detection>> {
            Ok(vec![Detection {
                bbox: self.0,
                class_id: 0,
                label: "plate".to_string(),
                confidence: 0.9,
            }])
        }
    }

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&mut self, _crop: &PlateCrop) -> anyhow::Result<Vec<OcrFragment>> {
            Ok(vec![OcrFragment::new(self.0, 0.9)])
        }
    }

    fn frame(sequence: u64) -> CapturedFrame {
        CapturedFrame::new(vec![90; 16 * 8 * 3], 16, 8, sequence)
    }

    fn processor(dir: &TempDir, text: &'static str) -> PlateProcessor {
        PlateProcessor::new(
            // Session started long enough ago for the first detection to pass
            SaveGate::new(Duration::from_secs(5), Instant::now() - Duration::from_secs(60)),
            PlatePreprocessor::default(),
            Box::new(FixedOcr(text)),
            PlateTextNormalizer::default(),
            PlateLog::open(&dir.path().join("plates.csv")).unwrap(),
            ImageSink::open(&dir.path().join("detected")).unwrap(),
        )
    }

    fn outputs() -> (WorkerOutputs, Receiver<FrameUpdate>, Receiver<WorkerEvent>) {
        let (frames, frame_rx) = latest_channel();
        let (events, event_rx) = unbounded();
        let outputs = WorkerOutputs {
            frames,
            events,
            state: SessionState::shared(),
        };
        (outputs, frame_rx, event_rx)
    }

    #[test]
    fn test_loop_processes_until_source_ends() {
        let dir = TempDir::new().unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource {
            script: VecDeque::from(vec![
                Ok(Some(frame(0))),
                Err(CaptureError::Closed),
                Ok(Some(frame(2))),
                Ok(None),
            ]),
            open: true,
            released: released.clone(),
        };
        let parts = WorkerParts {
            source: Box::new(source),
            detector: Box::new(FixedDetector(BoundingBox::new(2, 2, 14, 6))),
            processor: processor(&dir, "B1234AB"),
            thresholds: DetectionThresholds::default(),
        };
        let (outputs, frame_rx, event_rx) = outputs();

        run_capture_loop(parts, &AtomicBool::new(false), &outputs);

        assert!(released.load(Ordering::SeqCst));

        let state = outputs.state.read();
        assert_eq!(state.frames_read, 2);
        assert_eq!(state.read_failures, 1);
        assert_eq!(state.detections, 2);
        // Both frames arrive within the gate interval
        assert_eq!(state.saves, 1);
        assert_eq!(state.plates_logged, 1);
        assert_eq!(state.last_plate.as_deref(), Some("B1234AB"));
        assert!(!state.is_capturing);
        drop(state);

        // Only the newest frame is kept, with the box drawn in green
        let update = frame_rx.try_recv().unwrap();
        assert_eq!(update.sequence, 2);
        assert_eq!(update.image.get_pixel(2, 2).0, [0, 255, 0]);
        assert!(frame_rx.try_recv().is_err());

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert!(matches!(
            events.as_slice(),
            [WorkerEvent::PlateRecorded { save_index: 0, .. }, WorkerEvent::Stopped]
        ));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plates.csv")).unwrap(),
            "PlateNumber\nB1234AB\n"
        );
    }

    #[test]
    fn test_rejected_text_reported() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource {
            script: VecDeque::from(vec![Ok(Some(frame(0)))]),
            open: true,
            released: Arc::new(AtomicBool::new(false)),
        };
        let parts = WorkerParts {
            source: Box::new(source),
            detector: Box::new(FixedDetector(BoundingBox::new(2, 2, 14, 6))),
            processor: processor(&dir, "??"),
            thresholds: DetectionThresholds::default(),
        };
        let (outputs, _frame_rx, event_rx) = outputs();

        run_capture_loop(parts, &AtomicBool::new(false), &outputs);

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(WorkerEvent::PlateRejected { save_index: 0, raw_text }) if raw_text.is_empty()
        ));
        assert_eq!(outputs.state.read().plates_logged, 0);
    }

    #[test]
    fn test_sink_failure_reported_and_loop_continues() {
        let dir = TempDir::new().unwrap();
        let proc = processor(&dir, "B1234");
        std::fs::remove_file(dir.path().join("plates.csv")).unwrap();

        let source = ScriptedSource {
            script: VecDeque::from(vec![Ok(Some(frame(0))), Ok(Some(frame(1)))]),
            open: true,
            released: Arc::new(AtomicBool::new(false)),
        };
        let parts = WorkerParts {
            source: Box::new(source),
            detector: Box::new(FixedDetector(BoundingBox::new(2, 2, 14, 6))),
            processor: proc,
            thresholds: DetectionThresholds::default(),
        };
        let (outputs, _frame_rx, event_rx) = outputs();

        run_capture_loop(parts, &AtomicBool::new(false), &outputs);

        let state = outputs.state.read();
        assert_eq!(state.frames_read, 2);
        assert_eq!(state.plates_logged, 0);
        assert!(state.last_error.is_some());
        drop(state);

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, WorkerEvent::SinkFailed(_))));
    }

    #[test]
    fn test_successful_save_clears_previous_error() {
        let (outputs, _frame_rx, event_rx) = outputs();
        let saved = |failures: Vec<StorageError>| {
            ProcessOutcome::Saved(SaveReport {
                index: 0,
                raw_text: String::new(),
                plate: None,
                logged: false,
                image_path: None,
                failures,
            })
        };

        let disk_full = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        report_outcome(saved(vec![StorageError::io("plates.csv", disk_full)]), &outputs);
        assert!(outputs.state.read().last_error.is_some());

        report_outcome(saved(Vec::new()), &outputs);
        let state = outputs.state.read();
        assert!(state.last_error.is_none());
        assert_eq!(state.saves, 2);
        drop(state);

        let failures = event_rx
            .try_iter()
            .filter(|e| matches!(e, WorkerEvent::SinkFailed(_)))
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_stop_joins_before_release_completes() {
        let dir = TempDir::new().unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicBool::new(false));
        let parts = WorkerParts {
            source: Box::new(EndlessSource {
                reads: reads.clone(),
                released: released.clone(),
            }),
            detector: Box::new(FixedDetector(BoundingBox::new(0, 0, 4, 4))),
            processor: processor(&dir, "B1"),
            thresholds: DetectionThresholds::default(),
        };
        let (outputs, frame_rx, event_rx) = outputs();
        let state = outputs.state.clone();

        let mut worker = CaptureWorker::spawn(parts, outputs).unwrap();
        // Wait for at least one published frame
        frame_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.stop();

        assert!(worker.is_finished());
        assert!(released.load(Ordering::SeqCst));
        assert!(reads.load(Ordering::SeqCst) >= 1);
        assert!(!state.read().is_capturing);
        assert!(event_rx.try_iter().any(|e| matches!(e, WorkerEvent::Stopped)));
    }
}
