use std::io;

use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera, NokhwaError,
};

use crate::{
    errors::{CaptureError, Result},
    types::four_cc::FourCC,
};

use super::{DeviceBackend, GrabbedFrame, StreamFormat, ThermalDevice};

///
/// Opens cameras through nokhwa's native backend (V4L2, AVFoundation, MSMF).
///
pub struct NokhwaBackend;

impl DeviceBackend for NokhwaBackend {
    fn open(&self, index: u32) -> Result<Box<dyn ThermalDevice>> {
        let camera = Camera::new(
            CameraIndex::Index(index),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        )
        .map_err(|err| CaptureError::DeviceUnavailable {
            index,
            reason: err.to_string(),
        })?;
        log::info!("Opened camera {} ({})", index, camera.info().human_name());
        Ok(Box::new(NokhwaDevice {
            index,
            camera: Some(camera),
        }))
    }
}

//
// nokhwa has no Y16 frame format. Y16 streams carry the same 2 bytes per
// pixel as YUYV, so Y16 is requested as YUYV and the bytes are read back
// untouched through frame_raw (which never converts to RGB). The applied
// format reports what nokhwa negotiated, YUYV included.
//
pub struct NokhwaDevice {
    index: u32,
    camera: Option<Camera>,
}

fn to_frame_format(fourcc: FourCC) -> Option<FrameFormat> {
    match fourcc {
        FourCC::Y16 | FourCC::YUYV => Some(FrameFormat::YUYV),
        FourCC::MJPG => Some(FrameFormat::MJPEG),
        FourCC::GREY => Some(FrameFormat::GRAY),
        FourCC::NV12 => Some(FrameFormat::NV12),
        FourCC::RGB3 => Some(FrameFormat::RAWRGB),
        _ => None,
    }
}

fn from_frame_format(format: FrameFormat) -> FourCC {
    match format {
        FrameFormat::YUYV => FourCC::YUYV,
        FrameFormat::MJPEG => FourCC::MJPG,
        FrameFormat::GRAY => FourCC::GREY,
        FrameFormat::NV12 => FourCC::NV12,
        FrameFormat::RAWRGB => FourCC::RGB3,
        #[allow(unreachable_patterns)]
        _ => FourCC(*b"????"),
    }
}

fn io_error(err: NokhwaError) -> CaptureError {
    CaptureError::Io(io::Error::other(err.to_string()))
}

impl NokhwaDevice {
    fn camera(&mut self) -> Result<&mut Camera> {
        self.camera
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState("camera is closed".to_string()))
    }
}

impl ThermalDevice for NokhwaDevice {
    fn set_pixel_format(&mut self, format: StreamFormat) -> Result<()> {
        let frame_format = to_frame_format(format.fourcc).ok_or_else(|| {
            CaptureError::Format(format!("pixel format {} is not supported", format.fourcc))
        })?;
        if format.fourcc == FourCC::Y16 {
            log::debug!(
                "Camera {}: requesting Y16 as YUYV, it travels as YUYV through nokhwa",
                self.index
            );
        }
        let camera = self.camera()?;
        camera
            .set_camera_requset(RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::Closest(CameraFormat::new(
                    Resolution::new(format.width, format.height),
                    frame_format,
                    format.frame_rate,
                )),
            ))
            .map_err(io_error)?;
        Ok(())
    }

    fn pixel_format(&self) -> Result<StreamFormat> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| CaptureError::InvalidState("camera is closed".to_string()))?;
        let format = camera.camera_format();
        Ok(StreamFormat::new(
            format.width(),
            format.height(),
            from_frame_format(format.format()),
            format.frame_rate(),
        ))
    }

    fn set_convert_rgb(&mut self, enabled: bool) -> Result<()> {
        // frames are always read with frame_raw, nothing to switch off
        if enabled {
            return Err(CaptureError::Format(
                "RGB conversion is not used for raw capture".to_string(),
            ));
        }
        Ok(())
    }

    fn grab(&mut self) -> Result<GrabbedFrame> {
        let format = self.pixel_format()?;
        let camera = self.camera()?;
        if !camera.is_stream_open() {
            camera.open_stream().map_err(io_error)?;
        }
        let data = camera.frame_raw().map_err(io_error)?.into_owned();
        Ok(GrabbedFrame {
            layout: format.layout(),
            data,
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut camera) = self.camera.take() {
            if camera.is_stream_open() {
                camera.stop_stream().map_err(io_error)?;
            }
            log::info!("Closed camera {}", self.index);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.camera.is_some()
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("Failed to close camera {}: {}", self.index, err);
        }
    }
}
