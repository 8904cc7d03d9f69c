use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard},
};

use image::RgbImage;

use crate::{
    calibration::{store::CalibrationStore, CalibrationCatalog},
    camera_adapter::{default_adapter, CameraAdapter},
    camera_session::CameraSession,
    capture_state::{CapturePhase, CaptureStateMachine},
    clock::{Clock, SystemClock},
    device::DeviceBackend,
    errors::{CaptureError, Result},
    frame_buffer::FrameBuffer,
    preview::{preview_image, PreviewSettings},
    recorders::{
        image_recorder::{ImageEncoder, TiffEncoder},
        recording_sequencer::{RecordingSequencer, RecordingSession},
    },
    retry::RetryPolicy,
    thermal_data::RawFrame,
    types::camera_id::CameraId,
};

pub type FrameNotifier = Arc<dyn Fn(CameraId) + Send + Sync>;

pub struct DualCaptureConfig {
    pub adapter: Arc<dyn CameraAdapter>,
    pub retry: RetryPolicy,
    pub encoder: Arc<dyn ImageEncoder>,
    pub clock: Arc<dyn Clock>,
}

impl Default for DualCaptureConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            retry: RetryPolicy::default(),
            encoder: Arc::new(TiffEncoder),
            clock: Arc::new(SystemClock),
        }
    }
}

#[derive(Debug, Default)]
pub struct StartOutcome {
    pub started: Vec<CameraId>,
    pub failed: Vec<(CameraId, CaptureError)>,
}

impl StartOutcome {
    pub fn any_started(&self) -> bool {
        !self.started.is_empty()
    }
}

//
// Everything the grab threads and the query side share.
//
struct SharedCaptureState {
    frames: FrameBuffer,
    catalog: RwLock<CalibrationCatalog>,
    state: CaptureStateMachine,
    sequencer: RecordingSequencer,
    notifier: RwLock<Option<FrameNotifier>>,
}

// errors that will repeat on every following frame of the session
fn directory_unwritable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::ReadOnlyFilesystem
            | io::ErrorKind::StorageFull
    )
}

impl SharedCaptureState {
    fn catalog(&self) -> RwLockReadGuard<'_, CalibrationCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // runs on the grab thread of `camera`, one frame at a time
    fn handle_frame(&self, camera: CameraId, frame: RawFrame) {
        let frame = Arc::new(frame);
        self.frames.update(camera, frame.clone());

        let broken_session = self
            .state
            .with_recording(|session| {
                match self.sequencer.write_frame(session, camera, &frame) {
                    Ok(_) => None,
                    Err(CaptureError::Io(err)) if !session.directory().is_dir() => {
                        log::error!(
                            "Recording directory {} is gone, aborting recording: {}",
                            session.directory().display(),
                            err
                        );
                        Some(session.clone())
                    }
                    Err(CaptureError::Io(err)) if directory_unwritable(&err) => {
                        log::error!(
                            "Recording directory {} is not writable, aborting recording: {}",
                            session.directory().display(),
                            err
                        );
                        Some(session.clone())
                    }
                    Err(err) => {
                        log::error!("Failed to record {} frame: {}", camera, err);
                        None
                    }
                }
            })
            .flatten();

        if let Some(session) = broken_session {
            if self.state.abort_recording(&session) {
                self.sequencer.end_session(&session);
            }
        }

        let notifier = self
            .notifier
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(notifier) = notifier {
            notifier(camera);
        }
    }

    fn query_temperature(&self, camera: CameraId, x: usize, y: usize) -> Result<f64> {
        let raw = self
            .frames
            .snapshot(camera)
            .and_then(|frame| frame.sample_at(x, y))
            .ok_or(CaptureError::OutOfBounds { camera, x, y })?;
        Ok(self.catalog().temperature(camera, raw as f64))
    }

    fn query_center_temperature(&self, camera: CameraId) -> Result<f64> {
        let center = self
            .frames
            .snapshot(camera)
            .map(|frame| frame.center())
            .ok_or(CaptureError::OutOfBounds { camera, x: 0, y: 0 })?;
        self.query_temperature(camera, center.x, center.y)
    }
}

///
/// Read-only handle to the latest frames and temperatures. Cheap to clone
/// and safe to use from any thread while capture is running.
///
#[derive(Clone)]
pub struct CaptureReader {
    shared: Arc<SharedCaptureState>,
}

impl CaptureReader {
    pub fn latest_frame(&self, camera: CameraId) -> Option<Arc<RawFrame>> {
        self.shared.frames.snapshot(camera)
    }

    pub fn query_temperature(&self, camera: CameraId, x: usize, y: usize) -> Result<f64> {
        self.shared.query_temperature(camera, x, y)
    }

    pub fn query_center_temperature(&self, camera: CameraId) -> Result<f64> {
        self.shared.query_center_temperature(camera)
    }

    pub fn phase(&self) -> CapturePhase {
        self.shared.state.phase()
    }

    pub fn preview(&self, camera: CameraId, settings: &PreviewSettings) -> Option<RgbImage> {
        self.latest_frame(camera)
            .map(|frame| preview_image(&frame, settings))
    }
}

///
/// Runs the two camera sessions and routes their frames to the frame
/// buffer, the recorder and the optional frame notifier.
///
/// Either camera can fail to start without affecting the other.
///
pub struct DualCapture {
    backend: Arc<dyn DeviceBackend>,
    adapter: Arc<dyn CameraAdapter>,
    retry: RetryPolicy,
    shared: Arc<SharedCaptureState>,
    sessions: [Option<CameraSession>; 2],
    output_directory: Option<PathBuf>,
}

impl DualCapture {
    pub fn new(backend: Arc<dyn DeviceBackend>, catalog: CalibrationCatalog) -> Self {
        Self::with_config(backend, catalog, DualCaptureConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn DeviceBackend>,
        catalog: CalibrationCatalog,
        config: DualCaptureConfig,
    ) -> Self {
        Self {
            backend,
            adapter: config.adapter,
            retry: config.retry,
            shared: Arc::new(SharedCaptureState {
                frames: FrameBuffer::new(),
                catalog: RwLock::new(catalog),
                state: CaptureStateMachine::new(),
                sequencer: RecordingSequencer::new(config.encoder, config.clock),
                notifier: RwLock::new(None),
            }),
            sessions: [None, None],
            output_directory: None,
        }
    }

    pub fn reader(&self) -> CaptureReader {
        CaptureReader {
            shared: self.shared.clone(),
        }
    }

    //
    // Called on the grab thread after every frame has been published.
    //
    pub fn set_frame_notifier(&self, notifier: Option<FrameNotifier>) {
        *self
            .shared
            .notifier
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = notifier;
    }

    pub fn phase(&self) -> CapturePhase {
        self.shared.state.phase()
    }

    pub fn is_running(&self, camera: CameraId) -> bool {
        self.sessions[camera.slot()].is_some()
    }

    ///
    /// Opens and starts every camera that has a device index. Anything
    /// started before is stopped first. Cameras are brought up one after
    /// the other and a failure only affects that camera.
    ///
    pub fn start(&mut self, camera1: Option<u32>, camera2: Option<u32>) -> StartOutcome {
        self.stop();

        let mut outcome = StartOutcome::default();
        for (camera, index) in CameraId::ALL.into_iter().zip([camera1, camera2]) {
            self.shared.frames.clear(camera);
            let Some(index) = index else {
                continue;
            };
            match self.start_camera(camera, index) {
                Ok(session) => {
                    self.sessions[camera.slot()] = Some(session);
                    outcome.started.push(camera);
                }
                Err(err) => {
                    log::error!("Failed to start {} (device {}): {}", camera, index, err);
                    outcome.failed.push((camera, err));
                }
            }
        }

        if outcome.any_started() {
            self.shared.state.begin_capture();
        }
        outcome
    }

    fn start_camera(&self, camera: CameraId, index: u32) -> Result<CameraSession> {
        let mut session = CameraSession::new(camera, self.adapter.clone());
        session.open(self.backend.clone(), index, &self.retry)?;
        session.configure_y16()?;
        let shared = self.shared.clone();
        session.start(Box::new(move |frame| shared.handle_frame(camera, frame)))?;
        log::info!("Started {} on device {}", camera, index);
        Ok(session)
    }

    ///
    /// Ends any recording, then stops both cameras and releases their
    /// devices. Returns once no frame is being processed anymore.
    ///
    pub fn stop(&mut self) {
        self.stop_recording();
        for slot in self.sessions.iter_mut() {
            if let Some(mut session) = slot.take() {
                session.stop();
            }
        }
        if let Some(session) = self.shared.state.end_capture() {
            self.shared.sequencer.end_session(&session);
        }
    }

    pub fn query_temperature(&self, camera: CameraId, x: usize, y: usize) -> Result<f64> {
        self.shared.query_temperature(camera, x, y)
    }

    pub fn query_center_temperature(&self, camera: CameraId) -> Result<f64> {
        self.shared.query_center_temperature(camera)
    }

    pub fn preview(&self, camera: CameraId, settings: &PreviewSettings) -> Option<RgbImage> {
        self.reader().preview(camera, settings)
    }

    pub fn output_directory(&self) -> Option<&Path> {
        self.output_directory.as_deref()
    }

    pub fn set_output_directory(&mut self, directory: Option<PathBuf>) {
        self.output_directory = directory;
    }

    pub fn start_recording(&self, label: &str) -> Result<Arc<RecordingSession>> {
        let root = self.output_directory.as_deref().ok_or_else(|| {
            CaptureError::InvalidState("no output directory selected".to_string())
        })?;
        self.shared.state.begin_recording(|| {
            let catalog = self.shared.catalog();
            self.shared.sequencer.begin_session(root, label, &catalog)
        })
    }

    pub fn stop_recording(&self) -> Option<Arc<RecordingSession>> {
        let session = self.shared.state.end_recording()?;
        self.shared.sequencer.end_session(&session);
        Some(session)
    }

    pub fn recording(&self) -> Option<Arc<RecordingSession>> {
        self.shared.state.recording()
    }

    pub fn catalog(&self) -> CalibrationCatalog {
        self.shared.catalog().clone()
    }

    pub fn update_catalog<F: FnOnce(&mut CalibrationCatalog)>(&self, f: F) {
        let mut catalog = self
            .shared
            .catalog
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut catalog);
    }

    //
    // Replaces the catalog with the file contents. On failure the current
    // catalog stays in use.
    //
    pub fn reload_calibration(&self, store: &CalibrationStore) -> Result<()> {
        let catalog = store.reload()?;
        self.update_catalog(|current| *current = catalog);
        Ok(())
    }

    pub fn save_calibration(&self, store: &CalibrationStore) -> Result<()> {
        store.save(&self.shared.catalog())
    }
}

impl Drop for DualCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
