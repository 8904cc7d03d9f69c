//! Synthetic cameras producing generated Y16 frames.
//!
//! Used for demos without hardware and throughout the tests.

use std::{
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::{
    errors::{CaptureError, Result},
    thermal_data::FrameLayout,
    types::four_cc::FourCC,
};

use super::{DeviceBackend, GrabbedFrame, StreamFormat, ThermalDevice};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticPattern {
    Uniform(u16),
    // sample = start + x * step, saturating
    Ramp { start: u16, step: u16 },
}

impl SyntheticPattern {
    fn sample(&self, x: usize) -> u16 {
        match *self {
            SyntheticPattern::Uniform(value) => value,
            SyntheticPattern::Ramp { start, step } => {
                start.saturating_add(step.saturating_mul(x.min(u16::MAX as usize) as u16))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SyntheticStats {
    pub opens: AtomicU32,
    pub closes: AtomicU32,
    pub frames: AtomicU64,
}

impl SyntheticStats {
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub native_format: StreamFormat,
    pub pattern: SyntheticPattern,
    pub frame_interval: Duration,
    // number of open calls that fail before the device shows up
    pub failed_opens: u32,
    pub ignores_format_requests: bool,
    // every n-th frame is delivered as 8-bit RGB
    pub corrupt_every: Option<u64>,
    pub stats: Arc<SyntheticStats>,
}

impl SyntheticCamera {
    //
    // Lepton-like 160x122 Y16 camera showing a uniform scene.
    //
    pub fn lepton(value: u16) -> Self {
        Self {
            native_format: StreamFormat::new(160, 122, FourCC::Y16, 9),
            pattern: SyntheticPattern::Uniform(value),
            frame_interval: Duration::from_millis(5),
            failed_opens: 0,
            ignores_format_requests: false,
            corrupt_every: None,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    pub fn with_pattern(mut self, pattern: SyntheticPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_failed_opens(mut self, failed_opens: u32) -> Self {
        self.failed_opens = failed_opens;
        self
    }

    pub fn ignoring_format_requests(mut self) -> Self {
        self.ignores_format_requests = true;
        self
    }

    pub fn corrupting_every(mut self, n: u64) -> Self {
        self.corrupt_every = Some(n.max(1));
        self
    }
}

///
/// Backend serving a fixed list of synthetic cameras, indexed by position.
///
#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    cameras: Vec<SyntheticCamera>,
}

impl SyntheticBackend {
    pub fn new(cameras: Vec<SyntheticCamera>) -> Self {
        Self { cameras }
    }

    pub fn camera(&self, index: u32) -> Option<&SyntheticCamera> {
        self.cameras.get(index as usize)
    }
}

impl DeviceBackend for SyntheticBackend {
    fn open(&self, index: u32) -> Result<Box<dyn ThermalDevice>> {
        let camera = self
            .camera(index)
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                index,
                reason: "no such device".to_string(),
            })?;
        let attempt = camera.stats.opens.fetch_add(1, Ordering::SeqCst);
        if attempt < camera.failed_opens {
            return Err(CaptureError::DeviceUnavailable {
                index,
                reason: "device busy".to_string(),
            });
        }
        Ok(Box::new(SyntheticDevice {
            camera: camera.clone(),
            format: camera.native_format,
            open: true,
            frame_count: 0,
        }))
    }
}

pub struct SyntheticDevice {
    camera: SyntheticCamera,
    format: StreamFormat,
    open: bool,
    frame_count: u64,
}

impl SyntheticDevice {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(CaptureError::InvalidState("device is closed".to_string()))
        }
    }

    fn render(&self, format: &StreamFormat) -> Vec<u8> {
        let (width, height) = (format.width as usize, format.height as usize);
        let mut data = Vec::with_capacity(width * height * 2);
        for _ in 0..height {
            for x in 0..width {
                data.extend_from_slice(&self.camera.pattern.sample(x).to_le_bytes());
            }
        }
        data
    }
}

impl ThermalDevice for SyntheticDevice {
    fn set_pixel_format(&mut self, format: StreamFormat) -> Result<()> {
        self.ensure_open()?;
        if !self.camera.ignores_format_requests {
            self.format = format;
        }
        Ok(())
    }

    fn pixel_format(&self) -> Result<StreamFormat> {
        self.ensure_open()?;
        Ok(self.format)
    }

    fn set_convert_rgb(&mut self, _enabled: bool) -> Result<()> {
        self.ensure_open()
    }

    fn grab(&mut self) -> Result<GrabbedFrame> {
        self.ensure_open()?;
        thread::sleep(self.camera.frame_interval);
        self.frame_count += 1;
        self.camera.stats.frames.fetch_add(1, Ordering::SeqCst);

        if let Some(n) = self.camera.corrupt_every {
            if self.frame_count % n == 0 {
                let (width, height) = (self.format.width as usize, self.format.height as usize);
                return Ok(GrabbedFrame {
                    layout: FrameLayout {
                        width,
                        height,
                        stride_bytes: width * 3,
                        bytes_per_sample: 1,
                        channels: 3,
                    },
                    data: vec![0; width * height * 3],
                });
            }
        }

        let format = self.format;
        Ok(GrabbedFrame {
            layout: FrameLayout::y16(format.width as usize, format.height as usize),
            data: self.render(&format),
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.camera.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
