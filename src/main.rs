//! PlateScanner - Real-time license plate scanning
//!
//! Detects plates in camera frames, reads them with an OCR engine, keeps the
//! overlay in step with the latest detection and collects every plate that
//! passes validation.

mod capture;
mod config;
mod error;
mod overlay;
mod pipeline;
mod recognition;
mod replay;
mod session;
mod vision;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::overlay::SnapshotWriter;
use crate::pipeline::{Pipeline, PresentationEvent};
use crate::replay::{Scenario, ScenarioSource, ScriptedDetector, ScriptedOcr};

/// How long to wait for outstanding recognitions after the source ends
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// PlateScanner - license plate detection and recognition
#[derive(Parser, Debug)]
#[command(name = "plate-scanner")]
#[command(about = "Scan license plates from camera frames and collect validated numbers")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a recorded scenario instead of a live camera
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Write annotated frames to this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let config = config::load_or_default(&config_path)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.write_config {
        config::save_config(&config, &config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    info!("PlateScanner starting...");
    info!("Using configuration from {:?}", config_path);

    let Some(scenario_path) = args.scenario else {
        bail!("No frame source available; pass --scenario to replay a recording");
    };

    run_scenario(&config, &scenario_path, args.snapshot_dir.as_deref())?;

    info!("PlateScanner shutdown complete");
    Ok(())
}

/// Replay a scenario through the pipeline and report the collected plates
fn run_scenario(config: &AppConfig, path: &std::path::Path, snapshot_dir: Option<&std::path::Path>) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let mut source = ScenarioSource::new(&scenario, config.camera.front_facing)?;
    let detector = ScriptedDetector::new(scenario.detections());
    let engine = ScriptedOcr::new(&scenario.ocr, source.upright_sizes());

    let snapshots = match snapshot_dir {
        Some(dir) => Some(SnapshotWriter::new(dir, config.overlay.clone())?),
        None => None,
    };

    let mut pipeline = Pipeline::start(config, Box::new(detector), Arc::new(engine), snapshots)?;

    // Stand-in for the presentation layer
    let presented = pipeline.presentation_events();
    let presenter = std::thread::Builder::new()
        .name("plate-presenter".to_string())
        .spawn(move || {
            for event in presented.iter() {
                match event {
                    PresentationEvent::EmptyDetection => info!("Overlay cleared"),
                    PresentationEvent::Detection { boxes, inference_time } => {
                        info!("{} boxes on screen ({:?})", boxes.len(), inference_time)
                    }
                    PresentationEvent::PlateAccepted(plate) => info!("Plate accepted: {}", plate),
                    PresentationEvent::BoxTextUpdated { text, .. } => info!("Box labelled {:?}", text),
                    PresentationEvent::RecognitionFailed { reason } => warn!("Recognition failed: {}", reason),
                }
            }
        })?;

    pipeline.run_source(&mut source, config.camera.frame_interval())?;

    if !pipeline.wait_idle(DRAIN_TIMEOUT) {
        warn!("Pipeline did not settle within {:?}", DRAIN_TIMEOUT);
    }

    let session = pipeline.snapshot();
    let stats = pipeline.stats();
    pipeline.shutdown();
    drop(pipeline);
    if presenter.join().is_err() {
        warn!("Presenter thread panicked");
    }

    if let Some(latency) = session.last_inference_time {
        info!("Last detection pass took {:?}", latency);
    }
    if let Some(error) = &session.last_error {
        warn!("Last recognition error: {}", error);
    }

    if session.registry.is_empty() {
        println!("No plates recognized");
    } else {
        println!("Plates ({}):", session.registry.len());
        println!("{}", session.registry.display_text());
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
