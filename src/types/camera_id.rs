use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

//
// Identifies one of the two camera slots.
// The string form ("camera1", "camera2") is what the calibration file and the
// recorded frame file names use.
//
#[derive(
    EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum CameraId {
    #[strum(serialize = "camera1")]
    #[serde(rename = "camera1")]
    Camera1,
    #[strum(serialize = "camera2")]
    #[serde(rename = "camera2")]
    Camera2,
}

impl CameraId {
    pub const ALL: [CameraId; 2] = [CameraId::Camera1, CameraId::Camera2];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraId::Camera1 => "camera1",
            CameraId::Camera2 => "camera2",
        }
    }

    /// Slot index used by the fixed-size per-camera arrays.
    pub fn slot(&self) -> usize {
        match self {
            CameraId::Camera1 => 0,
            CameraId::Camera2 => 1,
        }
    }
}
