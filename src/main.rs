//! PlateReader - camera license plate reader
//!
//! Reads frames, detects plates, validates the OCR text against the plate
//! grammar and keeps a log of recognized plates.

mod app;
mod capture;
mod config;
mod display;
mod pipeline;
mod plate;
mod shared;
mod storage;
mod vision;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::PlateReaderApp;
use crate::config::AppConfig;
use crate::display::{FrameView, RecentPlatesTable};
use crate::shared::WorkerEvent;

/// How long the consumer waits for a frame before checking on the worker
const FRAME_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// PlateReader - license plate capture and logging
#[derive(Parser, Debug)]
#[command(name = "plate-reader")]
#[command(about = "Detects license plates in camera frames and logs validated plate numbers")]
struct Args {
    /// Directory of frames to replay (with recorded `<frame>.json` annotations)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plate log file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Directory for preprocessed plate crops
    #[arg(long)]
    detected_dir: Option<PathBuf>,

    /// Write the latest annotated frame to this image file on every table refresh
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Stop capturing after this many seconds
    #[arg(long)]
    max_seconds: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("PlateReader starting...");

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(log) = &args.log {
        config.storage.log_path = log.clone();
    }
    if let Some(dir) = &args.detected_dir {
        config.storage.detected_dir = dir.clone();
    }

    let Some(source_dir) = args.source.clone().or_else(|| config.capture.source_dir.clone()) else {
        bail!("No frame source given; pass --source or set capture.source_dir");
    };

    let mut app = PlateReaderApp::start_replay(&config, &source_dir)?;
    run_display(&mut app, &config, &args);

    app.stop();
    info!("Session finished: {}", app.state.read().summary());
    info!("PlateReader shutdown complete");

    Ok(())
}

/// Load configuration from the given file, the user config directory, or defaults
fn load_or_create_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
            }
            info!("Using default configuration");
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        match config::save_config(&config, &config_path) {
            Ok(()) => info!("Created default configuration at {:?}", config_path),
            Err(e) => warn!("Failed to write default configuration: {:#}", e),
        }
        return Ok(config);
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Consume frames and events until the worker stops or the time limit passes
fn run_display(app: &mut PlateReaderApp, config: &AppConfig, args: &Args) {
    let mut table = RecentPlatesTable::new(
        config.display.recent_rows,
        config.display.refresh_interval(),
    );
    let mut view = FrameView::new();
    let deadline = args
        .max_seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        view.wait(&app.frames, FRAME_POLL_TIMEOUT);

        let mut stopped = false;
        for event in app.events.try_iter() {
            match event {
                WorkerEvent::PlateRecorded {
                    save_index,
                    plate,
                    image_path,
                } => match image_path {
                    Some(path) => info!("[{}] {} ({})", save_index, plate, path.display()),
                    None => info!("[{}] {} (no crop saved)", save_index, plate),
                },
                WorkerEvent::PlateRejected { save_index, raw_text } => {
                    info!("[{}] no plate in {:?}", save_index, raw_text);
                }
                WorkerEvent::SinkFailed(message) => error!("Write failed: {}", message),
                WorkerEvent::Stopped => stopped = true,
            }
        }

        let now = Instant::now();
        match table.refresh_if_due(app.log(), now) {
            Ok(true) => show(&table, &view, args),
            Ok(false) => {}
            Err(e) => warn!("Failed to refresh plate table: {}", e),
        }

        if stopped || !app.is_running() {
            break;
        }
        if deadline.is_some_and(|d| now >= d) {
            info!("Time limit reached");
            break;
        }
    }

    app.stop();
    view.poll(&app.frames);
    match table.refresh(app.log(), Instant::now()) {
        Ok(_) => show(&table, &view, args),
        Err(e) => warn!("Failed to refresh plate table: {}", e),
    }
}

/// Print the plate table and write the preview frame
fn show(table: &RecentPlatesTable, view: &FrameView, args: &Args) {
    println!("{}", table.render());

    if let Some(update) = view.latest() {
        info!(
            "Frame {}: {} plate(s) in view ({} frames shown)",
            update.sequence,
            update.detections.len(),
            view.frames_received()
        );
    }

    if let Some(path) = &args.preview {
        if let Err(e) = view.save_preview(path) {
            warn!("Failed to write preview: {}", e);
        }
    }
}
