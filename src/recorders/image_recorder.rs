use std::path::Path;

use crate::{
    errors::{CaptureError, Result},
    thermal_data::RawFrame,
};

///
/// Persists a single raw frame.
///
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, frame: &RawFrame, path: &Path) -> Result<()>;
}

///
/// Writes frames as 16-bit greyscale TIFF, samples untouched.
///
pub struct TiffEncoder;

impl ImageEncoder for TiffEncoder {
    fn encode(&self, frame: &RawFrame, path: &Path) -> Result<()> {
        let img = frame.to_luma16().ok_or_else(|| {
            CaptureError::Format(format!(
                "{}x{} frame does not fit its sample buffer",
                frame.width(),
                frame.height()
            ))
        })?;
        img.save_with_format(path, image::ImageFormat::Tiff)?;
        Ok(())
    }
}
