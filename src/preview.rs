use image::RgbImage;

use crate::{
    temperature::{Temp, TempRange},
    thermal_data::RawFrame,
    thermal_gradient::{ThermalGradient, THERMAL_GRADIENTS},
};

// 18 °C .. 100 °C in centi-Kelvin
pub const DEFAULT_FIXED_RANGE: (u16, u16) = (29115, 37315);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PreviewRange {
    // normalize over the frame's own min and max
    Auto,
    Fixed(TempRange),
}

#[derive(Clone, Debug)]
pub struct PreviewSettings {
    pub range: PreviewRange,
    pub gradient: ThermalGradient,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            range: PreviewRange::Auto,
            gradient: THERMAL_GRADIENTS[0].clone(),
        }
    }
}

impl PreviewSettings {
    pub fn fixed_default_range() -> PreviewRange {
        PreviewRange::Fixed(TempRange::new(
            Temp::from_centi_kelvin(DEFAULT_FIXED_RANGE.0 as f64),
            Temp::from_centi_kelvin(DEFAULT_FIXED_RANGE.1 as f64),
        ))
    }

    pub fn range_for(&self, frame: &RawFrame) -> TempRange {
        match self.range {
            PreviewRange::Fixed(range) => range,
            PreviewRange::Auto => {
                let (min_pos, max_pos) = frame.get_min_max_pos();
                let sample = |x, y| frame.sample_at(x, y).unwrap_or_default() as f64;
                TempRange::new(
                    Temp::from_centi_kelvin(sample(min_pos.x, min_pos.y)),
                    Temp::from_centi_kelvin(sample(max_pos.x, max_pos.y)),
                )
            }
        }
    }
}

///
/// Renders a false-color 8-bit preview of a raw frame.
///
pub fn preview_image(frame: &RawFrame, settings: &PreviewSettings) -> RgbImage {
    let range = settings.range_for(frame);
    frame.map_to_image(|raw| {
        let factor = range
            .factor(Temp::from_centi_kelvin(raw as f64))
            .clamp(0.0, 1.0);
        settings.gradient.get_color(factor)
    })
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn grey_settings(range: PreviewRange) -> PreviewSettings {
        PreviewSettings {
            range,
            gradient: ThermalGradient::by_name("Black to white").unwrap().clone(),
        }
    }

    #[test]
    fn test_auto_range_spans_frame() {
        let frame = RawFrame::new(3, 1, vec![29000, 30000, 31000]).unwrap();
        let img = preview_image(&frame, &grey_settings(PreviewRange::Auto));
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([128, 128, 128]));
        assert_eq!(*img.get_pixel(2, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_fixed_range_clamps() {
        let frame = RawFrame::new(2, 1, vec![10000, 60000]).unwrap();
        let img = preview_image(&frame, &grey_settings(PreviewSettings::fixed_default_range()));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_uniform_frame_does_not_produce_nan() {
        let frame = RawFrame::filled(2, 2, 30000);
        let img = preview_image(&frame, &PreviewSettings::default());
        assert_eq!(img.dimensions(), (2, 2));
    }
}
