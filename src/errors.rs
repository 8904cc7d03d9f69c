use thiserror::Error;

use crate::types::camera_id::CameraId;

//
// Errors produced by the capture and calibration core.
//
// Per-frame errors (Format) are logged and the frame is dropped, session-level
// errors (DeviceUnavailable) only stop the affected camera and Domain errors
// never leave the interpolator as anything but a fallback value.
//
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera device {index} is unavailable: {reason}")]
    DeviceUnavailable { index: u32, reason: String },

    #[error("unexpected format: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("pixel ({x}, {y}) is outside the current {camera} frame")]
    OutOfBounds { camera: CameraId, x: usize, y: usize },

    #[error("degenerate calibration segment at raw value {raw_value}")]
    Domain { raw_value: f64 },

    #[error("{0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            CaptureError::Io(err.into())
        } else {
            CaptureError::Format(err.to_string())
        }
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => CaptureError::Io(io),
            other => CaptureError::Format(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
