//! Piecewise-linear conversion from raw sensor samples to temperature.
//!
//! Calibration is a best-effort correction: readings outside every
//! calibrated segment, and curves with fewer than two points, fall back to
//! the uncalibrated Celsius value.

use std::borrow::Cow;

use crate::{
    errors::{CaptureError, Result},
    temperature::CELSIUS_OFFSET,
};

use super::CalibrationPoint;

pub fn raw_to_celsius(raw_centi_kelvin: f64) -> f64 {
    raw_centi_kelvin / 100.0 - CELSIUS_OFFSET
}

pub fn is_sorted(points: &[CalibrationPoint]) -> bool {
    points.windows(2).all(|p| p[0].raw_value <= p[1].raw_value)
}

///
/// Interpolates `celsius` over the first segment of `points` that brackets it.
///
/// Returns `Ok(None)` when no segment brackets the value and
/// `Err(CaptureError::Domain)` when the bracketing segment has zero width.
/// `points` must be sorted by ascending raw value.
///
pub fn interpolate(celsius: f64, points: &[CalibrationPoint]) -> Result<Option<f64>> {
    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if celsius < lo.raw_value || celsius > hi.raw_value {
            continue;
        }
        let width = hi.raw_value - lo.raw_value;
        if width == 0.0 {
            return Err(CaptureError::Domain {
                raw_value: lo.raw_value,
            });
        }
        // exact hits return the reference value untouched
        if celsius == lo.raw_value {
            return Ok(Some(lo.reference_temperature));
        }
        if celsius == hi.raw_value {
            return Ok(Some(hi.reference_temperature));
        }
        let factor = (celsius - lo.raw_value) / width;
        let value =
            lo.reference_temperature + factor * (hi.reference_temperature - lo.reference_temperature);
        if !value.is_finite() {
            return Err(CaptureError::Domain {
                raw_value: lo.raw_value,
            });
        }
        return Ok(Some(value));
    }
    Ok(None)
}

///
/// Converts a raw centi-Kelvin sample to a calibrated Celsius temperature.
///
/// Never fails: an uncovered reading or a degenerate segment yields the
/// uncalibrated Celsius value. Unsorted curves are interpolated over a sorted
/// copy.
///
pub fn temperature(raw_centi_kelvin: f64, points: &[CalibrationPoint]) -> f64 {
    let celsius = raw_to_celsius(raw_centi_kelvin);

    let points: Cow<'_, [CalibrationPoint]> = if is_sorted(points) {
        Cow::Borrowed(points)
    } else {
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.raw_value.total_cmp(&b.raw_value));
        Cow::Owned(sorted)
    };

    match interpolate(celsius, &points) {
        Ok(Some(calibrated)) => calibrated,
        Ok(None) => celsius,
        Err(err) => {
            log::warn!("Falling back to uncalibrated reading: {}", err);
            celsius
        }
    }
}
