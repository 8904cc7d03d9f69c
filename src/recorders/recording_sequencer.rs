use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, Local};

use crate::{
    calibration::{
        store::{serialize_catalog, CALIBRATION_FILE_NAME},
        CalibrationCatalog,
    },
    clock::Clock,
    errors::{CaptureError, Result},
    thermal_data::RawFrame,
    types::camera_id::CameraId,
    util::pathify_string,
};

use super::image_recorder::ImageEncoder;

const SESSION_DIR_TIME_FORMAT: &str = "%H_%M-%d-%m-%y_";

pub fn frame_file_name(camera: CameraId, counter: u32) -> String {
    format!("{}_{:04}.tiff", camera, counter)
}

///
/// One recording: a directory holding the calibration snapshot and the
/// numbered frames of both cameras.
///
/// Each camera has its own counter. It is locked for the whole write so a
/// session never hands out the same number twice.
///
pub struct RecordingSession {
    directory: PathBuf,
    label: String,
    started_at: DateTime<Local>,
    counters: [Mutex<u32>; 2],
    active: AtomicBool,
}

impl RecordingSession {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    //
    // Number the next frame of this camera will get.
    //
    pub fn counter(&self, camera: CameraId) -> u32 {
        *self.counters[camera.slot()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn files_written(&self, camera: CameraId) -> u32 {
        self.counter(camera)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("directory", &self.directory)
            .field("started_at", &self.started_at)
            .field("camera1", &self.counter(CameraId::Camera1))
            .field("camera2", &self.counter(CameraId::Camera2))
            .field("active", &self.is_active())
            .finish()
    }
}

///
/// Creates recording directories and writes numbered frames into them
/// through an [`ImageEncoder`].
///
pub struct RecordingSequencer {
    encoder: Arc<dyn ImageEncoder>,
    clock: Arc<dyn Clock>,
}

impl RecordingSequencer {
    pub fn new(encoder: Arc<dyn ImageEncoder>, clock: Arc<dyn Clock>) -> Self {
        Self { encoder, clock }
    }

    pub fn session_directory_name(started_at: &DateTime<Local>, label: &str) -> String {
        format!(
            "{}{}",
            started_at.format(SESSION_DIR_TIME_FORMAT),
            pathify_string(label)
        )
    }

    pub fn begin_session(
        &self,
        root: &Path,
        label: &str,
        catalog: &CalibrationCatalog,
    ) -> Result<Arc<RecordingSession>> {
        let started_at = self.clock.now();
        fs::create_dir_all(root)?;
        let directory = create_unique_dir(root, &Self::session_directory_name(&started_at, label))?;

        let snapshot = serialize_catalog(catalog)?;
        fs::write(directory.join(CALIBRATION_FILE_NAME), snapshot)?;

        log::info!("Started recording to {}", directory.display());
        Ok(Arc::new(RecordingSession {
            directory,
            label: label.to_string(),
            started_at,
            counters: [Mutex::new(0), Mutex::new(0)],
            active: AtomicBool::new(true),
        }))
    }

    ///
    /// Writes the frame as the next file of `camera` and returns its path.
    /// The counter only moves once the encoder succeeded, so a failed write
    /// is retried under the same name by the next frame.
    ///
    pub fn write_frame(
        &self,
        session: &RecordingSession,
        camera: CameraId,
        frame: &RawFrame,
    ) -> Result<PathBuf> {
        let mut counter = session.counters[camera.slot()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !session.is_active() {
            return Err(CaptureError::InvalidState(format!(
                "recording in {} has ended",
                session.directory.display()
            )));
        }

        let path = session.directory.join(frame_file_name(camera, *counter));
        self.encoder.encode(frame, &path)?;
        *counter += 1;
        Ok(path)
    }

    pub fn end_session(&self, session: &RecordingSession) {
        // wait for in-flight writes of both cameras before flipping the flag
        let counters: Vec<_> = session
            .counters
            .iter()
            .map(|c| c.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
            .collect();
        if !session.active.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!(
            "Stopped recording to {} ({} frames from camera1, {} from camera2)",
            session.directory.display(),
            counters[0],
            counters[1]
        );
    }
}

//
// Creates root/name, or root/name_2, root/name_3, ... when a recording
// with the same name already started within the same minute.
//
fn create_unique_dir(root: &Path, name: &str) -> Result<PathBuf> {
    let mut suffix = 1;
    loop {
        let candidate = if suffix == 1 {
            root.join(name)
        } else {
            root.join(format!("{}_{}", name, suffix))
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(err) => return Err(err.into()),
        }
    }
}
