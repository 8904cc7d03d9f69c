use std::{
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use dual_thermal::{
    calibration::store::{inspect_catalog, CalibrationStore},
    camera_enumerator::enumerate_cameras,
    device::{
        nokhwa_backend::NokhwaBackend,
        synthetic::{SyntheticBackend, SyntheticCamera, SyntheticPattern},
        DeviceBackend,
    },
    dual_capture::{DualCapture, DualCaptureConfig},
    temperature_monitor::TemperatureMonitor,
    types::camera_id::CameraId,
    user_preferences::UserPreferences,
};

/// Capture, calibrate and record two thermal cameras
#[derive(Parser, Debug)]
#[command(name = "dual-thermal")]
#[command(version)]
struct Args {
    /// Preferences file to use instead of the one in the config directory
    #[arg(long, global = true)]
    preferences: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the video devices and the thermal cameras among them
    List,

    /// Capture from both cameras until Enter is pressed
    Run {
        /// Device index of camera 1
        #[arg(long)]
        camera1: Option<u32>,

        /// Device index of camera 2
        #[arg(long)]
        camera2: Option<u32>,

        /// Leave camera 1 off
        #[arg(long, conflicts_with = "camera1")]
        no_camera1: bool,

        /// Leave camera 2 off
        #[arg(long, conflicts_with = "camera2")]
        no_camera2: bool,

        /// Directory recordings are created in
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Label appended to the recording directory name
        #[arg(short, long)]
        label: Option<String>,

        /// Start recording right away
        #[arg(short, long)]
        record: bool,

        /// Calibration file
        #[arg(short, long)]
        calibration: Option<PathBuf>,

        /// Use generated frames instead of real cameras
        #[arg(long)]
        synthetic: bool,
    },

    /// Inspect the calibration file
    Calibration {
        #[command(subcommand)]
        action: CalibrationAction,

        /// Calibration file
        #[arg(short, long, global = true)]
        calibration: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CalibrationAction {
    /// Print the curves as loaded
    Show,
    /// Report unsorted, duplicate or degenerate curves
    Check,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let prefs = match &args.preferences {
        Some(path) => UserPreferences::load_from(path)?,
        None => UserPreferences::load()
            .inspect_err(|err| log::error!("Failed to load preferences: {}", err))
            .unwrap_or_default(),
    };

    match args.command {
        Command::List => list_cameras(),
        Command::Run {
            camera1,
            camera2,
            no_camera1,
            no_camera2,
            output,
            label,
            record,
            calibration,
            synthetic,
        } => {
            let mut prefs = prefs;
            if camera1.is_some() || no_camera1 {
                prefs.camera1_index = camera1;
            }
            if camera2.is_some() || no_camera2 {
                prefs.camera2_index = camera2;
            }
            if output.is_some() {
                prefs.output_directory = output;
            }
            if let Some(label) = label {
                prefs.recording_label = label;
            }
            if let Some(calibration) = calibration {
                prefs.calibration_file = calibration;
            }
            run(&prefs, record, synthetic)
        }
        Command::Calibration {
            action,
            calibration,
        } => {
            let path = calibration.unwrap_or(prefs.calibration_file);
            match action {
                CalibrationAction::Show => show_calibration(&path),
                CalibrationAction::Check => check_calibration(&path),
            }
        }
    }
}

fn list_cameras() -> Result<()> {
    let cameras = enumerate_cameras()?;
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in cameras {
        println!("{}", camera.display_name());
    }
    Ok(())
}

fn synthetic_backend() -> SyntheticBackend {
    SyntheticBackend::new(vec![
        SyntheticCamera::lepton(0).with_pattern(SyntheticPattern::Ramp {
            start: 29315,
            step: 10,
        }),
        SyntheticCamera::lepton(31015),
    ])
}

fn run(prefs: &UserPreferences, record: bool, synthetic: bool) -> Result<()> {
    let store = CalibrationStore::new(&prefs.calibration_file);
    let catalog = store.load_or_default();

    let backend: Arc<dyn DeviceBackend> = if synthetic {
        Arc::new(synthetic_backend())
    } else {
        Arc::new(NokhwaBackend)
    };
    let mut capture = DualCapture::with_config(
        backend,
        catalog,
        DualCaptureConfig {
            retry: prefs.open_retry,
            ..DualCaptureConfig::default()
        },
    );
    capture.set_output_directory(prefs.output_directory.clone());

    let outcome = capture.start(prefs.camera1_index, prefs.camera2_index);
    if !outcome.any_started() {
        bail!("No camera could be started");
    }

    let unit = prefs.temperature_unit;
    let mut monitor = TemperatureMonitor::spawn(
        capture.reader(),
        prefs.refresh_interval(),
        Box::new(move |camera, celsius| match celsius {
            Some(celsius) => log::info!("{}: {}", camera, unit.format(celsius)),
            None => log::debug!("{}: no frame yet", camera),
        }),
    )?;

    let session = if record {
        let session = capture
            .start_recording(&prefs.recording_label)
            .context("Failed to start recording")?;
        println!("Recording to {}", session.directory().display());
        Some(session)
    } else {
        None
    };

    println!("Capturing, press Enter to stop");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    monitor.stop();
    capture.stop();

    if let Some(session) = session {
        println!(
            "Recording \"{}\" started {} in {}",
            session.label(),
            session.started_at().format("%Y-%m-%d %H:%M:%S"),
            session.directory().display()
        );
        for camera in CameraId::ALL {
            println!(
                "{}: {} frames written",
                camera,
                session.files_written(camera)
            );
        }
    }
    Ok(())
}

fn show_calibration(path: &Path) -> Result<()> {
    let catalog = CalibrationStore::new(path).load()?;
    for curve in catalog.curves() {
        println!("{} ({} points)", curve.camera_id, curve.points.len());
        for point in &curve.points {
            println!(
                "  raw {:>8.2}  ->  {:>8.2}",
                point.raw_value, point.reference_temperature
            );
        }
    }
    Ok(())
}

fn check_calibration(path: &Path) -> Result<()> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let issues = inspect_catalog(&contents)
        .with_context(|| format!("Malformed calibration file {}", path.display()))?;

    if issues.is_empty() {
        println!("{}: OK", path.display());
        return Ok(());
    }
    for issue in &issues {
        println!("{}", issue);
    }
    bail!("{} problem(s) found in {}", issues.len(), path.display())
}
