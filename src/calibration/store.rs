use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{
    errors::{CaptureError, Result},
    types::camera_id::CameraId,
};

use super::{CalibrationCatalog, CameraCalibrationCurve};

pub const CALIBRATION_FILE_NAME: &str = "calibrationData.json";

///
/// Loads and saves the calibration catalog at a fixed path.
///
/// The file is a JSON array of `{ "CameraId": ..., "Points": [...] }` objects.
/// Unknown fields are ignored. Entries that cannot be read are replaced by an
/// empty curve for their camera, and both known cameras always end up with a
/// curve.
///
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<CalibrationCatalog> {
        let contents = fs::read_to_string(&self.path)?;
        parse_catalog(&contents)
    }

    //
    // Same as load, meant to be called after the file was edited externally.
    // The returned catalog replaces whatever the caller held before.
    //
    pub fn reload(&self) -> Result<CalibrationCatalog> {
        let catalog = self.load()?;
        log::info!("Reloaded calibration data from {}", self.path.display());
        Ok(catalog)
    }

    //
    // Loads the catalog, substituting empty curves when the file is missing
    // or unreadable so readings stay available uncalibrated.
    //
    pub fn load_or_default(&self) -> CalibrationCatalog {
        self.load()
            .inspect_err(|err| {
                log::error!(
                    "Failed to load calibration data from {}: {}",
                    self.path.display(),
                    err
                )
            })
            .unwrap_or_else(|_| CalibrationCatalog::with_known_cameras())
    }

    pub fn save(&self, catalog: &CalibrationCatalog) -> Result<()> {
        let json = serialize_catalog(catalog)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, json)?;
        log::info!("Saved calibration data to {}", self.path.display());
        Ok(())
    }
}

pub fn parse_catalog(contents: &str) -> Result<CalibrationCatalog> {
    let root: Value = serde_json::from_str(contents)?;
    let entries = match root {
        Value::Array(entries) => entries,
        // an explicit null is an empty file as far as we are concerned
        Value::Null => Vec::new(),
        other => {
            return Err(CaptureError::Format(format!(
                "calibration data must be a list of cameras, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut curves: Vec<CameraCalibrationCurve> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let Some(curve) = parse_curve(i, entry) else {
            continue;
        };
        if curves.iter().any(|c| c.camera_id == curve.camera_id) {
            log::warn!(
                "Ignoring duplicate calibration entry for {}",
                curve.camera_id
            );
            continue;
        }
        curves.push(curve);
    }

    let mut catalog = CalibrationCatalog::from_curves(curves);
    catalog.ensure_known_cameras();
    Ok(catalog)
}

fn parse_curve(index: usize, entry: Value) -> Option<CameraCalibrationCurve> {
    let camera_id = entry
        .get("CameraId")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<CameraCalibrationCurve>(entry) {
        Ok(mut curve) => {
            if !curve.is_sorted() {
                log::warn!(
                    "Calibration points for {} are not sorted by raw value, sorting",
                    curve.camera_id
                );
                curve.sort();
            }
            Some(curve)
        }
        Err(err) => match camera_id {
            Some(camera_id) => {
                log::warn!(
                    "Malformed calibration points for {}, using an empty curve: {}",
                    camera_id,
                    err
                );
                Some(CameraCalibrationCurve::empty(camera_id))
            }
            None => {
                log::warn!("Skipping calibration entry {} without a camera id: {}", index, err);
                None
            }
        },
    }
}

//
// Serializes the catalog exactly as held, pretty-printed.
//
pub fn serialize_catalog(catalog: &CalibrationCatalog) -> Result<String> {
    Ok(serde_json::to_string_pretty(catalog.curves())?)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogIssue {
    MissingCamera(String),
    DuplicateEntry(String),
    // ignored on load, its camera falls back to an empty curve
    MalformedEntry {
        index: usize,
        camera_id: Option<String>,
    },
    Unsorted(String),
    DegenerateSegment {
        camera_id: String,
        index: usize,
        raw_value: f64,
    },
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogIssue::MissingCamera(id) => write!(f, "{}: no calibration entry", id),
            CatalogIssue::DuplicateEntry(id) => write!(f, "{}: duplicate entry, ignored", id),
            CatalogIssue::MalformedEntry {
                index,
                camera_id: Some(id),
            } => write!(f, "{}: entry {} is malformed, loaded as empty", id, index),
            CatalogIssue::MalformedEntry {
                index,
                camera_id: None,
            } => write!(f, "entry {} is malformed and has no camera id, skipped", index),
            CatalogIssue::Unsorted(id) => {
                write!(f, "{}: points are not sorted by raw value", id)
            }
            CatalogIssue::DegenerateSegment {
                camera_id,
                index,
                raw_value,
            } => write!(
                f,
                "{}: points {} and {} share raw value {}",
                camera_id,
                index,
                index + 1,
                raw_value
            ),
        }
    }
}

///
/// Lists everything `parse_catalog` silently repairs or works around.
/// Fails exactly when `parse_catalog` fails.
///
pub fn inspect_catalog(contents: &str) -> Result<Vec<CatalogIssue>> {
    let catalog = parse_catalog(contents)?;
    let entries = match serde_json::from_str::<Value>(contents)? {
        Value::Array(entries) => entries,
        _ => Vec::new(),
    };

    let mut issues = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let camera_id = entry
            .get("CameraId")
            .and_then(Value::as_str)
            .map(str::to_string);
        match serde_json::from_value::<CameraCalibrationCurve>(entry) {
            Ok(curve) => {
                if seen.contains(&curve.camera_id) {
                    issues.push(CatalogIssue::DuplicateEntry(curve.camera_id));
                    continue;
                }
                if !curve.is_sorted() {
                    issues.push(CatalogIssue::Unsorted(curve.camera_id.clone()));
                }
                seen.push(curve.camera_id);
            }
            Err(_) => {
                match &camera_id {
                    Some(id) if seen.contains(id) => {
                        issues.push(CatalogIssue::DuplicateEntry(id.clone()));
                        continue;
                    }
                    Some(id) => seen.push(id.clone()),
                    None => {}
                }
                issues.push(CatalogIssue::MalformedEntry { index, camera_id });
            }
        }
    }

    for camera in CameraId::ALL {
        if !seen.iter().any(|id| id == camera.as_str()) {
            issues.push(CatalogIssue::MissingCamera(camera.as_str().to_string()));
        }
    }
    for curve in catalog.curves() {
        for index in curve.degenerate_segments() {
            issues.push(CatalogIssue::DegenerateSegment {
                camera_id: curve.camera_id.clone(),
                index,
                raw_value: curve.points[index].raw_value,
            });
        }
    }
    Ok(issues)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use crate::{calibration::CalibrationPoint, types::camera_id::CameraId};

    use super::*;

    const SAMPLE: &str = r#"[
        { "CameraId": "camera1", "Points": [
            { "RawValue": 20.0, "ReferenceTemperature": 20.5 },
            { "RawValue": 30.0, "ReferenceTemperature": 31.0, "Comment": "bath" }
        ], "Operator": "lab" },
        { "CameraId": "camera2", "Points": [] }
    ]"#;

    fn store_with(contents: &str) -> (tempfile::TempDir, CalibrationStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CALIBRATION_FILE_NAME);
        fs::write(&path, contents).unwrap();
        (dir, CalibrationStore::new(path))
    }

    #[test]
    fn test_load_ignores_unknown_fields() {
        let (_dir, store) = store_with(SAMPLE);
        let catalog = store.load().unwrap();
        assert_eq!(
            catalog.points_for(CameraId::Camera1),
            &[
                CalibrationPoint::new(20.0, 20.5),
                CalibrationPoint::new(30.0, 31.0)
            ]
        );
        assert!(catalog.points_for(CameraId::Camera2).is_empty());
    }

    #[test]
    fn test_missing_camera_is_synthesized() {
        let (_dir, store) =
            store_with(r#"[{ "CameraId": "camera2", "Points": [{ "RawValue": 1, "ReferenceTemperature": 2 }] }]"#);
        let catalog = store.load().unwrap();
        assert!(catalog.curve("camera1").unwrap().points.is_empty());
        assert_eq!(catalog.points_for(CameraId::Camera2).len(), 1);
    }

    #[test]
    fn test_malformed_entry_becomes_empty_curve() {
        let (_dir, store) = store_with(
            r#"[{ "CameraId": "camera1", "Points": "oops" }, { "Points": [] }, 42]"#,
        );
        let catalog = store.load().unwrap();
        assert_eq!(catalog.curves().len(), 2);
        assert!(catalog.points_for(CameraId::Camera1).is_empty());
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        let (_dir, store) = store_with("[]");
        let catalog = store.load().unwrap();
        assert_eq!(catalog, CalibrationCatalog::with_known_cameras());
    }

    #[test]
    fn test_unparsable_file_is_format_error() {
        let (_dir, store) = store_with("{ not json");
        assert!(matches!(store.load(), Err(CaptureError::Format(_))));

        let (_dir, store) = store_with(r#"{ "CameraId": "camera1" }"#);
        assert!(matches!(store.load(), Err(CaptureError::Format(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("nope.json"));
        assert!(matches!(store.load(), Err(CaptureError::Io(_))));
        assert_eq!(store.load_or_default(), CalibrationCatalog::with_known_cameras());
    }

    #[test]
    fn test_unsorted_points_are_sorted_on_load() {
        let (_dir, store) = store_with(
            r#"[{ "CameraId": "camera1", "Points": [
                { "RawValue": 30.0, "ReferenceTemperature": 31.0 },
                { "RawValue": 20.0, "ReferenceTemperature": 20.5 }
            ] }]"#,
        );
        let catalog = store.load().unwrap();
        assert!(catalog.curve("camera1").unwrap().is_sorted());
        assert_eq!(catalog.points_for(CameraId::Camera1)[0].raw_value, 20.0);
    }

    #[test]
    fn test_save_then_load_is_idempotent() {
        let (_dir, store) = store_with(SAMPLE);
        let first = store.load().unwrap();
        store.save(&first).unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, second);
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn test_ice_point_survives_save() {
        let (_dir, store) = store_with(
            r#"[{ "CameraId": "camera1", "Points": [
                { "RawValue": -10.0, "ReferenceTemperature": -9.5 },
                { "RawValue": 0.0, "ReferenceTemperature": 0.0 }
            ] }]"#,
        );
        let first = store.load().unwrap();
        assert_eq!(first.points_for(CameraId::Camera1).len(), 2);
        store.save(&first).unwrap();
        let second = store.reload().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            second.points_for(CameraId::Camera1)[1],
            CalibrationPoint::new(0.0, 0.0)
        );
    }

    #[test]
    fn test_unsorted_file_is_stable_after_save() {
        let (_dir, store) = store_with(
            r#"[{ "CameraId": "camera2", "Points": [
                { "RawValue": 30.0, "ReferenceTemperature": 31.0 },
                { "RawValue": 0.0, "ReferenceTemperature": 0.0 },
                { "RawValue": 20.0, "ReferenceTemperature": 20.5 }
            ] }]"#,
        );
        let first = store.load().unwrap();
        store.save(&first).unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, second);
        assert!(second.curve("camera2").unwrap().is_sorted());
        assert_eq!(second.points_for(CameraId::Camera2).len(), 3);
    }

    #[test]
    fn test_inspect_clean_file() {
        assert!(inspect_catalog(SAMPLE).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_accepts_what_load_accepts() {
        let contents = r#"[
            { "CameraId": "camera1", "Points": "oops" },
            { "CameraId": "camera2", "Points": [
                { "RawValue": 30.0, "ReferenceTemperature": 31.0 },
                { "RawValue": 20.0, "ReferenceTemperature": 20.5 },
                { "RawValue": 20.0, "ReferenceTemperature": 21.0 }
            ] },
            { "CameraId": "camera2", "Points": [] }
        ]"#;
        assert!(parse_catalog(contents).is_ok());
        let issues = inspect_catalog(contents).unwrap();
        assert_eq!(
            issues,
            vec![
                CatalogIssue::MalformedEntry {
                    index: 0,
                    camera_id: Some("camera1".to_string())
                },
                CatalogIssue::Unsorted("camera2".to_string()),
                CatalogIssue::DuplicateEntry("camera2".to_string()),
                CatalogIssue::DegenerateSegment {
                    camera_id: "camera2".to_string(),
                    index: 0,
                    raw_value: 20.0
                },
            ]
        );
    }

    #[test]
    fn test_inspect_reports_missing_camera() {
        let issues = inspect_catalog(r#"[{ "CameraId": "camera1", "Points": [] }]"#).unwrap();
        assert_eq!(issues, vec![CatalogIssue::MissingCamera("camera2".to_string())]);
        assert_eq!(issues[0].to_string(), "camera2: no calibration entry");
    }

    #[test]
    fn test_inspect_fails_like_load() {
        assert!(matches!(
            inspect_catalog(r#"{ "CameraId": "camera1" }"#),
            Err(CaptureError::Format(_))
        ));
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("Data").join(CALIBRATION_FILE_NAME));
        store.save(&CalibrationCatalog::with_known_cameras()).unwrap();
        assert!(store.path().exists());
    }
}
