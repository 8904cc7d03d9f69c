use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::{
    device::StreamFormat,
    thermal_data::{CropRect, FrameLayout},
};

pub mod purethermal_lepton;

///
/// Model specific constants of a thermal camera.
///
pub trait CameraAdapter: Send + Sync {
    ///
    /// Get friendly name of the camera model
    ///
    fn name(&self) -> String;

    fn short_name(&self) -> String;

    ///
    /// Stream format to request from the device
    ///
    fn requested_format(&self) -> StreamFormat;

    ///
    /// Interior rectangle holding image data. Everything outside it is
    /// sensor metadata and gets discarded.
    ///
    fn crop(&self) -> CropRect;

    fn usb_vid_pids(&self) -> Vec<(u16, u16)>;

    fn raw_layout(&self) -> FrameLayout {
        self.requested_format().layout()
    }
}

pub static CAMERA_ADAPTERS: Lazy<Vec<Arc<dyn CameraAdapter>>> =
    Lazy::new(|| vec![Arc::new(purethermal_lepton::PureThermalLeptonAdapter {})]);

pub fn default_adapter() -> Arc<dyn CameraAdapter> {
    CAMERA_ADAPTERS[0].clone()
}

pub fn adapter_for_vid_pid(vid: u16, pid: u16) -> Option<Arc<dyn CameraAdapter>> {
    CAMERA_ADAPTERS
        .iter()
        .find(|adapter| adapter.usb_vid_pids().contains(&(vid, pid)))
        .cloned()
}
