use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{dual_capture::CaptureReader, types::camera_id::CameraId};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

pub type TemperatureSink = Box<dyn FnMut(CameraId, Option<f64>) + Send>;

enum TemperatureMonitorCmd {
    Stop,
}

///
/// Periodically reads the center temperature of both cameras and passes it
/// to a sink. A camera without a frame yet is reported as `None`.
///
/// The timer runs independently of frame arrival and never waits for one.
///
pub struct TemperatureMonitor {
    cmd_sender: Option<mpsc::Sender<TemperatureMonitorCmd>>,
    thread: Option<JoinHandle<()>>,
}

impl TemperatureMonitor {
    pub fn spawn(
        reader: CaptureReader,
        interval: Duration,
        mut sink: TemperatureSink,
    ) -> std::io::Result<Self> {
        let (cmd_sender, cmd_receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("temperature-monitor".to_string())
            .spawn(move || loop {
                for camera in CameraId::ALL {
                    sink(camera, reader.query_center_temperature(camera).ok());
                }
                match cmd_receiver.recv_timeout(interval) {
                    Ok(TemperatureMonitorCmd::Stop)
                    | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }
            })?;
        Ok(Self {
            cmd_sender: Some(cmd_sender),
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        if let Some(cmd_sender) = self.cmd_sender.take() {
            let _ = cmd_sender.send(TemperatureMonitorCmd::Stop);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Temperature monitor panicked");
            }
        }
    }
}

impl Drop for TemperatureMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;

    use crate::{
        calibration::CalibrationCatalog,
        device::synthetic::{SyntheticBackend, SyntheticCamera},
        dual_capture::{DualCapture, DualCaptureConfig},
        retry::RetryPolicy,
    };

    use super::*;

    fn capture() -> DualCapture {
        DualCapture::with_config(
            Arc::new(SyntheticBackend::new(vec![SyntheticCamera::lepton(29815)])),
            CalibrationCatalog::with_known_cameras(),
            DualCaptureConfig {
                retry: RetryPolicy::once(),
                ..DualCaptureConfig::default()
            },
        )
    }

    #[test]
    fn test_reports_none_without_frames() {
        let capture = capture();
        let readings = Arc::new(Mutex::new(Vec::new()));
        let sink = readings.clone();
        let mut monitor = TemperatureMonitor::spawn(
            capture.reader(),
            Duration::from_millis(5),
            Box::new(move |camera, value| sink.lock().unwrap().push((camera, value))),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        monitor.stop();

        let readings = readings.lock().unwrap();
        assert!(readings.len() >= 2);
        assert!(readings.iter().all(|(_, value)| value.is_none()));
    }

    #[test]
    fn test_reports_center_temperature() {
        let mut capture = capture();
        capture.start(Some(0), None);
        let readings = Arc::new(Mutex::new(Vec::new()));
        let sink = readings.clone();
        let monitor = TemperatureMonitor::spawn(
            capture.reader(),
            Duration::from_millis(5),
            Box::new(move |camera, value| sink.lock().unwrap().push((camera, value))),
        )
        .unwrap();

        for _ in 0..400 {
            let found = readings
                .lock()
                .unwrap()
                .iter()
                .any(|&(camera, value)| camera == CameraId::Camera1 && value.is_some());
            if found {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        drop(monitor);

        let readings = readings.lock().unwrap();
        let camera1 = readings
            .iter()
            .filter(|(camera, _)| *camera == CameraId::Camera1)
            .find_map(|(_, value)| *value)
            .unwrap();
        assert_relative_eq!(camera1, 25.0, epsilon = 1e-9);
        assert!(readings
            .iter()
            .filter(|(camera, _)| *camera == CameraId::Camera2)
            .all(|(_, value)| value.is_none()));
    }

    #[test]
    fn test_stop_is_prompt_and_final() {
        let capture = capture();
        let calls = Arc::new(Mutex::new(0u32));
        let sink = calls.clone();
        let mut monitor = TemperatureMonitor::spawn(
            capture.reader(),
            Duration::from_secs(60),
            Box::new(move |_, _| *sink.lock().unwrap() += 1),
        )
        .unwrap();
        let started = std::time::Instant::now();
        monitor.stop();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        let count = *calls.lock().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*calls.lock().unwrap(), count);
    }
}
