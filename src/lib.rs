//! Capture, calibration and recording for a pair of Y16 thermal cameras.

pub mod calibration;
pub mod camera_adapter;
pub mod camera_enumerator;
pub mod camera_session;
pub mod capture_state;
pub mod clock;
pub mod device;
pub mod dual_capture;
pub mod errors;
pub mod frame_buffer;
pub mod preview;
pub mod recorders;
pub mod retry;
pub mod temperature;
pub mod temperature_monitor;
pub mod thermal_data;
pub mod thermal_gradient;
pub mod types;
pub mod user_preferences;
pub mod util;
