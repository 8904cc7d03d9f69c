//! Calibration data model.
//!
//! A calibration curve is an ordered list of (raw, reference) pairs per
//! camera. Raw values are expressed in degrees Celsius as reported by the
//! camera, reference values are the true temperature measured alongside.

use serde::{Deserialize, Serialize};

use crate::types::camera_id::CameraId;

pub mod interpolator;
pub mod store;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalibrationPoint {
    pub raw_value: f64,
    pub reference_temperature: f64,
}

impl CalibrationPoint {
    pub fn new(raw_value: f64, reference_temperature: f64) -> Self {
        Self {
            raw_value,
            reference_temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CameraCalibrationCurve {
    pub camera_id: String,
    pub points: Vec<CalibrationPoint>,
}

impl CameraCalibrationCurve {
    pub fn new(camera_id: impl Into<String>, points: Vec<CalibrationPoint>) -> Self {
        Self {
            camera_id: camera_id.into(),
            points,
        }
    }

    pub fn empty(camera_id: impl Into<String>) -> Self {
        Self::new(camera_id, Vec::new())
    }

    pub fn is_sorted(&self) -> bool {
        interpolator::is_sorted(&self.points)
    }

    /// Sorts the points by ascending raw value, keeping the order of equal values.
    pub fn sort(&mut self) {
        self.points
            .sort_by(|a, b| a.raw_value.total_cmp(&b.raw_value));
    }

    //
    // Indices i where points i and i+1 share the same raw value.
    // Such a segment cannot be interpolated.
    //
    pub fn degenerate_segments(&self) -> Vec<usize> {
        self.points
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].raw_value == pair[1].raw_value)
            .map(|(i, _)| i)
            .collect()
    }
}

///
/// Calibration curves for every known camera, in file order.
///
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationCatalog {
    curves: Vec<CameraCalibrationCurve>,
}

impl CalibrationCatalog {
    //
    // Catalog with an empty curve for each camera slot.
    //
    pub fn with_known_cameras() -> Self {
        let mut catalog = Self::default();
        catalog.ensure_known_cameras();
        catalog
    }

    pub fn from_curves(curves: Vec<CameraCalibrationCurve>) -> Self {
        Self { curves }
    }

    pub fn ensure_known_cameras(&mut self) {
        for camera in CameraId::ALL {
            if self.curve(camera.as_str()).is_none() {
                self.curves.push(CameraCalibrationCurve::empty(camera.as_str()));
            }
        }
    }

    pub fn curves(&self) -> &[CameraCalibrationCurve] {
        &self.curves
    }

    pub fn curve(&self, camera_id: &str) -> Option<&CameraCalibrationCurve> {
        self.curves.iter().find(|c| c.camera_id == camera_id)
    }

    pub fn curve_mut(&mut self, camera_id: &str) -> Option<&mut CameraCalibrationCurve> {
        self.curves.iter_mut().find(|c| c.camera_id == camera_id)
    }

    pub fn points_for(&self, camera: CameraId) -> &[CalibrationPoint] {
        self.curve(camera.as_str())
            .map(|c| c.points.as_slice())
            .unwrap_or(&[])
    }

    //
    // Replaces the curve for camera_id, adding it when missing.
    //
    pub fn set_points(&mut self, camera_id: &str, points: Vec<CalibrationPoint>) {
        match self.curve_mut(camera_id) {
            Some(curve) => curve.points = points,
            None => self.curves.push(CameraCalibrationCurve::new(camera_id, points)),
        }
    }

    pub fn temperature(&self, camera: CameraId, raw_centi_kelvin: f64) -> f64 {
        interpolator::temperature(raw_centi_kelvin, self.points_for(camera))
    }
}
