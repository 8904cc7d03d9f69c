use crate::{
    device::StreamFormat,
    thermal_data::CropRect,
    types::four_cc::FourCC,
};

use super::CameraAdapter;

const IMAGE_WIDTH: u32 = 160;
const IMAGE_HEIGHT: u32 = 120;
const TELEMETRY_ROWS: u32 = 2;
const FRAME_RATE: u32 = 9;

pub struct PureThermalLeptonAdapter {}

//
// Camera adapter for a FLIR Lepton 3.x on a PureThermal board
// See: https://groupgets.com/products/purethermal-3-flir-lepton-smart-i-o-module
// In Y16 mode the board streams 160x122 frames of little endian uint16 samples:
// - 160x120 rows of radiometric data in 1/100th's Kelvin
// - 2 trailing telemetry rows
//
// We keep the image rows and drop the telemetry.
//
impl CameraAdapter for PureThermalLeptonAdapter {
    fn name(&self) -> String {
        "PureThermal (FLIR Lepton 3.x)".to_string()
    }

    fn short_name(&self) -> String {
        "Lepton".to_string()
    }

    fn requested_format(&self) -> StreamFormat {
        StreamFormat::new(
            IMAGE_WIDTH,
            IMAGE_HEIGHT + TELEMETRY_ROWS,
            FourCC::Y16,
            FRAME_RATE,
        )
    }

    fn crop(&self) -> CropRect {
        CropRect::new(0, 0, IMAGE_WIDTH as usize, IMAGE_HEIGHT as usize)
    }

    fn usb_vid_pids(&self) -> Vec<(u16, u16)> {
        // Bus 001 Device 004: ID 1e4e:0100 Cubeternet WebCam
        vec![(0x1e4e, 0x0100)]
    }
}
