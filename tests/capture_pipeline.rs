use std::{fs, sync::Arc, thread, time::Duration};

use approx::assert_relative_eq;
use chrono::{Local, TimeZone};

use dual_thermal::{
    calibration::{
        store::{CalibrationStore, CALIBRATION_FILE_NAME},
        CalibrationPoint,
    },
    capture_state::CapturePhase,
    clock::FixedClock,
    device::synthetic::{SyntheticBackend, SyntheticCamera, SyntheticPattern},
    dual_capture::{DualCapture, DualCaptureConfig},
    errors::CaptureError,
    preview::PreviewSettings,
    retry::RetryPolicy,
    types::camera_id::CameraId,
};

const CALIBRATION: &str = r#"[
    { "CameraId": "camera1", "Points": [
        { "RawValue": 20.0, "ReferenceTemperature": 20.5 },
        { "RawValue": 30.0, "ReferenceTemperature": 31.0 }
    ] },
    { "CameraId": "camera2", "Points": [] }
]"#;

fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..600 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not met in time");
}

fn capture(dir: &std::path::Path, cameras: Vec<SyntheticCamera>) -> DualCapture {
    let calibration_path = dir.join(CALIBRATION_FILE_NAME);
    fs::write(&calibration_path, CALIBRATION).unwrap();
    let catalog = CalibrationStore::new(&calibration_path).load().unwrap();

    DualCapture::with_config(
        Arc::new(SyntheticBackend::new(cameras)),
        catalog,
        DualCaptureConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(1),
                attempt_timeout: Some(Duration::from_secs(2)),
            },
            clock: Arc::new(FixedClock(
                Local.with_ymd_and_hms(2023, 11, 30, 14, 2, 0).unwrap(),
            )),
            ..DualCaptureConfig::default()
        },
    )
}

#[test]
fn calibrated_and_uncalibrated_readings() {
    let dir = tempfile::tempdir().unwrap();
    let mut capture = capture(
        dir.path(),
        vec![
            SyntheticCamera::lepton(29815),
            SyntheticCamera::lepton(0).with_pattern(SyntheticPattern::Ramp {
                start: 29815,
                step: 100,
            }),
        ],
    );
    let outcome = capture.start(Some(0), Some(1));
    assert_eq!(outcome.started, vec![CameraId::Camera1, CameraId::Camera2]);

    let reader = capture.reader();
    wait_for(|| CameraId::ALL.iter().all(|&c| reader.latest_frame(c).is_some()));

    // camera1 is calibrated, 25.0 C sits halfway between the points
    assert_relative_eq!(
        reader.query_center_temperature(CameraId::Camera1).unwrap(),
        25.75,
        epsilon = 1e-9
    );
    // camera2 has no points and reports the sensor value
    assert_relative_eq!(
        reader.query_temperature(CameraId::Camera2, 3, 10).unwrap(),
        28.0,
        epsilon = 1e-9
    );
    assert!(matches!(
        reader.query_temperature(CameraId::Camera2, 500, 10),
        Err(CaptureError::OutOfBounds { .. })
    ));

    let preview = capture
        .preview(CameraId::Camera2, &PreviewSettings::default())
        .unwrap();
    assert_eq!(preview.dimensions(), (160, 120));

    capture.stop();
    assert_eq!(reader.phase(), CapturePhase::Idle);
}

#[test]
fn recording_cycle_produces_gap_free_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let recordings = dir.path().join("recordings");
    let mut capture = capture(
        dir.path(),
        vec![
            SyntheticCamera::lepton(30000),
            SyntheticCamera::lepton(31000).with_failed_opens(1),
        ],
    );
    capture.set_output_directory(Some(recordings.clone()));
    capture.start(Some(0), Some(1));

    for round in 0..2 {
        let session = capture.start_recording("bath test").unwrap();
        wait_for(|| {
            CameraId::ALL
                .iter()
                .all(|&c| session.files_written(c) >= 2)
        });
        capture.stop_recording().unwrap();
        assert_eq!(capture.phase(), CapturePhase::Capturing);

        let expected_dir = if round == 0 {
            "14_02-30-11-23_bath_test".to_string()
        } else {
            "14_02-30-11-23_bath_test_2".to_string()
        };
        assert_eq!(session.directory(), recordings.join(expected_dir));

        let snapshot = CalibrationStore::new(session.directory().join(CALIBRATION_FILE_NAME))
            .load()
            .unwrap();
        assert_eq!(
            snapshot.points_for(CameraId::Camera1),
            &[
                CalibrationPoint::new(20.0, 20.5),
                CalibrationPoint::new(30.0, 31.0)
            ]
        );

        for camera in CameraId::ALL {
            let written = session.files_written(camera);
            let mut names: Vec<String> = fs::read_dir(session.directory())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with(camera.as_str()))
                .collect();
            names.sort();
            let expected: Vec<String> = (0..written)
                .map(|n| format!("{}_{:04}.tiff", camera, n))
                .collect();
            assert_eq!(names, expected);
        }
    }

    capture.stop();
    assert_eq!(capture.phase(), CapturePhase::Idle);
}

#[test]
fn recorded_frames_keep_raw_samples() {
    let dir = tempfile::tempdir().unwrap();
    let mut capture = capture(dir.path(), vec![SyntheticCamera::lepton(30123)]);
    capture.set_output_directory(Some(dir.path().to_path_buf()));
    capture.start(Some(0), None);
    let session = capture.start_recording("raw").unwrap();
    wait_for(|| session.files_written(CameraId::Camera1) >= 1);
    capture.stop();

    let first = session.directory().join("camera1_0000.tiff");
    let image = image::open(first).unwrap().into_luma16();
    assert_eq!(image.dimensions(), (160, 120));
    assert!(image.pixels().all(|p| p.0[0] == 30123));
}
