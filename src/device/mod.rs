//! Device layer: the seam between the capture core and a camera API.

use crate::{errors::Result, thermal_data::FrameLayout, types::four_cc::FourCC};

pub mod nokhwa_backend;
pub mod synthetic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub frame_rate: u32,
}

impl StreamFormat {
    pub fn new(width: u32, height: u32, fourcc: FourCC, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            fourcc,
            frame_rate,
        }
    }

    //
    // (bytes per sample, channels) of a tightly packed frame in this format,
    // None for compressed or planar formats.
    //
    pub fn sample_shape(&self) -> Option<(usize, usize)> {
        match self.fourcc {
            FourCC::Y16 | FourCC::YUYV => Some((2, 1)),
            FourCC::GREY => Some((1, 1)),
            FourCC::RGB3 => Some((1, 3)),
            _ => None,
        }
    }

    //
    // True when frames in this format hold what `wanted` asked for. A Y16
    // request may come back labelled YUYV: same size, same 2 bytes per pixel.
    //
    pub fn carries(&self, wanted: &StreamFormat) -> bool {
        let same_fourcc = self.fourcc == wanted.fourcc
            || (wanted.fourcc == FourCC::Y16 && self.fourcc == FourCC::YUYV);
        same_fourcc
            && self.width == wanted.width
            && self.height == wanted.height
            && self.frame_rate == wanted.frame_rate
    }

    pub fn layout(&self) -> FrameLayout {
        let (bytes_per_sample, channels) = self.sample_shape().unwrap_or((1, 0));
        FrameLayout {
            width: self.width as usize,
            height: self.height as usize,
            stride_bytes: self.width as usize * bytes_per_sample * channels,
            bytes_per_sample,
            channels,
        }
    }
}

//
// One frame exactly as the device produced it.
//
#[derive(Debug, Clone)]
pub struct GrabbedFrame {
    pub layout: FrameLayout,
    pub data: Vec<u8>,
}

///
/// An open camera handle.
///
/// Implementations must release the underlying device in `close` and
/// tolerate `close` being called more than once.
///
pub trait ThermalDevice: Send {
    fn set_pixel_format(&mut self, format: StreamFormat) -> Result<()>;

    ///
    /// Format the device is actually delivering, read back after configuration.
    ///
    fn pixel_format(&self) -> Result<StreamFormat>;

    ///
    /// Enables or disables conversion of captured frames to RGB.
    /// Raw Y16 capture needs it disabled.
    ///
    fn set_convert_rgb(&mut self, enabled: bool) -> Result<()>;

    ///
    /// Blocks until the next frame arrives.
    ///
    fn grab(&mut self) -> Result<GrabbedFrame>;

    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

pub trait DeviceBackend: Send + Sync {
    ///
    /// Opens the device at `index`, failing with
    /// `CaptureError::DeviceUnavailable` when there is no live device there.
    ///
    fn open(&self, index: u32) -> Result<Box<dyn ThermalDevice>>;
}
