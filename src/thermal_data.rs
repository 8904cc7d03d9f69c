use image::{Rgb, RgbImage};

use crate::errors::{CaptureError, Result};

//
// Memory layout of a frame as delivered by the device layer.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    // Width in pixels
    pub width: usize,

    // Height in pixels
    pub height: usize,

    // Bytes between the start of two consecutive rows
    pub stride_bytes: usize,

    pub bytes_per_sample: usize,
    pub channels: usize,
}

impl FrameLayout {
    //
    // Tightly packed single-channel 16-bit layout.
    //
    pub fn y16(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            stride_bytes: width * 2,
            bytes_per_sample: 2,
            channels: 1,
        }
    }

    pub fn is_y16(&self) -> bool {
        self.bytes_per_sample == 2 && self.channels == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn fits_in(&self, width: usize, height: usize) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThermalDataPos {
    pub x: usize,
    pub y: usize,
}

///
/// A Y16 frame: one unsigned 16-bit sample per pixel in centi-Kelvin,
/// stored row by row without padding.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: usize,
    height: usize,
    data: Vec<u16>,
}

impl RawFrame {
    pub fn new(width: usize, height: usize, data: Vec<u16>) -> Result<Self> {
        if data.len() != width * height {
            return Err(CaptureError::Format(format!(
                "{}x{} frame needs {} samples, got {}",
                width,
                height,
                width * height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: u16) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    ///
    /// Copies the `crop` rectangle out of a device buffer.
    ///
    /// Fails with `CaptureError::Format` unless the layout is single-channel
    /// 16-bit, the buffer holds every row the layout promises and the
    /// rectangle lies inside the frame. Samples are little endian.
    ///
    pub fn decode_cropped(layout: &FrameLayout, bytes: &[u8], crop: CropRect) -> Result<Self> {
        if !layout.is_y16() {
            return Err(CaptureError::Format(format!(
                "expected single-channel 16-bit samples, got {} channel(s) of {} byte(s)",
                layout.channels, layout.bytes_per_sample
            )));
        }
        let row_bytes = layout.width * layout.bytes_per_sample;
        if layout.stride_bytes < row_bytes {
            return Err(CaptureError::Format(format!(
                "row stride {} is shorter than a {} pixel row",
                layout.stride_bytes, layout.width
            )));
        }
        if layout.height > 0 {
            let needed = layout.stride_bytes * (layout.height - 1) + row_bytes;
            if bytes.len() < needed {
                return Err(CaptureError::Format(format!(
                    "frame buffer holds {} bytes, {}x{} needs {}",
                    bytes.len(),
                    layout.width,
                    layout.height,
                    needed
                )));
            }
        }
        if !crop.fits_in(layout.width, layout.height) {
            return Err(CaptureError::Format(format!(
                "crop {:?} does not fit a {}x{} frame",
                crop, layout.width, layout.height
            )));
        }

        let mut data = Vec::with_capacity(crop.width * crop.height);
        for row in crop.y..crop.y + crop.height {
            let start = row * layout.stride_bytes + crop.x * layout.bytes_per_sample;
            let end = start + crop.width * layout.bytes_per_sample;
            data.extend(
                bytes[start..end]
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]])),
            );
        }
        Ok(Self {
            width: crop.width,
            height: crop.height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> &[u16] {
        &self.data
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    #[inline(always)]
    pub fn sample_at(&self, x: usize, y: usize) -> Option<u16> {
        if !self.contains(x, y) {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    pub fn center(&self) -> ThermalDataPos {
        ThermalDataPos {
            x: self.width / 2,
            y: self.height / 2,
        }
    }

    pub fn get_min_max_pos(&self) -> (ThermalDataPos, ThermalDataPos) {
        let mut min_pos = ThermalDataPos::default();
        let mut max_pos = ThermalDataPos::default();
        let mut min_value = u16::MAX;
        let mut max_value = u16::MIN;
        for (i, &sample) in self.data.iter().enumerate() {
            let pos = ThermalDataPos {
                x: i % self.width,
                y: i / self.width,
            };
            if sample < min_value {
                min_value = sample;
                min_pos = pos;
            }
            if sample > max_value {
                max_value = sample;
                max_pos = pos;
            }
        }
        (min_pos, max_pos)
    }

    pub fn map_to_image<F: Fn(u16) -> Rgb<u8>>(&self, callback: F) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            callback(self.data[y as usize * self.width + x as usize])
        })
    }

    pub fn to_luma16(&self) -> Option<image::ImageBuffer<image::Luma<u16>, Vec<u16>>> {
        image::ImageBuffer::from_raw(self.width as u32, self.height as u32, self.data.clone())
    }
}
