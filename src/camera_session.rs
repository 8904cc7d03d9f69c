use std::{
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    camera_adapter::CameraAdapter,
    device::{DeviceBackend, StreamFormat, ThermalDevice},
    errors::{CaptureError, Result},
    retry::RetryPolicy,
    thermal_data::RawFrame,
    types::{camera_id::CameraId, four_cc::FourCC},
};

// pause after a failed grab so a dead device does not spin the loop
const GRAB_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Y16Configured,
    Running,
    Stopped,
}

pub type FrameCallback = Box<dyn FnMut(RawFrame) + Send>;

enum CameraSessionCmd {
    Stop,
}

struct GrabLoopCtx {
    camera: CameraId,
    device: Box<dyn ThermalDevice>,
    adapter: Arc<dyn CameraAdapter>,
    on_frame: FrameCallback,
    cmd_receiver: mpsc::Receiver<CameraSessionCmd>,
}

///
/// One physical camera: opens the device, forces Y16 capture and runs a
/// background grab loop that hands every cropped frame to a callback.
///
/// Frames reach the callback one at a time in arrival order. `stop` waits for
/// the frame in flight to be fully processed, then releases the device.
///
pub struct CameraSession {
    camera: CameraId,
    adapter: Arc<dyn CameraAdapter>,
    state: SessionState,
    device: Option<Box<dyn ThermalDevice>>,
    cmd_sender: Option<mpsc::Sender<CameraSessionCmd>>,
    grab_thread: Option<JoinHandle<Box<dyn ThermalDevice>>>,
}

impl CameraSession {
    pub fn new(camera: CameraId, adapter: Arc<dyn CameraAdapter>) -> Self {
        Self {
            camera,
            adapter,
            state: SessionState::Closed,
            device: None,
            cmd_sender: None,
            grab_thread: None,
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some() || self.grab_thread.is_some()
    }

    pub fn open(
        &mut self,
        backend: Arc<dyn DeviceBackend>,
        device_index: u32,
        retry: &RetryPolicy,
    ) -> Result<()> {
        if self.state != SessionState::Closed {
            return Err(CaptureError::InvalidState(format!(
                "{} session is {:?}, close it before opening again",
                self.camera, self.state
            )));
        }
        self.state = SessionState::Opening;

        let what = format!("Opening {} (device {})", self.camera, device_index);
        match retry.run(&what, move |_| backend.open(device_index)) {
            Ok(device) => {
                self.device = Some(device);
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Closed;
                Err(match err {
                    CaptureError::DeviceUnavailable { .. } => err,
                    other => CaptureError::DeviceUnavailable {
                        index: device_index,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    ///
    /// Requests Y16 with RGB conversion disabled and reads the applied format
    /// back. Devices are free to ignore the request, so a mismatch is logged
    /// and capture carries on with whatever the device delivers.
    ///
    pub fn configure_y16(&mut self) -> Result<()> {
        let camera = self.camera;
        let requested = self.adapter.requested_format();
        let device = self.device.as_mut().ok_or_else(|| {
            CaptureError::InvalidState(format!("{} has no open device", camera))
        })?;

        let requested = StreamFormat {
            fourcc: FourCC::Y16,
            ..requested
        };
        if let Err(err) = device.set_pixel_format(requested) {
            log::warn!("{}: failed to request Y16: {}", camera, err);
        }
        if let Err(err) = device.set_convert_rgb(false) {
            log::warn!("{}: failed to disable RGB conversion: {}", camera, err);
        }

        match device.pixel_format() {
            Ok(applied) if applied == requested => {
                log::info!(
                    "{}: capturing {}x{} {} @ {} fps",
                    camera,
                    applied.width,
                    applied.height,
                    applied.fourcc,
                    applied.frame_rate
                );
            }
            Ok(applied) if applied.carries(&requested) => {
                log::info!(
                    "{}: capturing {}x{} Y16 @ {} fps, delivered as {}",
                    camera,
                    applied.width,
                    applied.height,
                    applied.frame_rate,
                    applied.fourcc
                );
            }
            Ok(applied) => {
                log::warn!(
                    "{}: requested {}x{} {} but the device delivers {}x{} {}",
                    camera,
                    requested.width,
                    requested.height,
                    requested.fourcc,
                    applied.width,
                    applied.height,
                    applied.fourcc
                );
            }
            Err(err) => log::warn!("{}: could not read back pixel format: {}", camera, err),
        }

        self.state = SessionState::Y16Configured;
        Ok(())
    }

    pub fn start(&mut self, on_frame: FrameCallback) -> Result<()> {
        if self.grab_thread.is_some() {
            return Err(CaptureError::InvalidState(format!(
                "{} is already running",
                self.camera
            )));
        }
        // move the device out of self so the grab thread owns it
        let device = self.device.take().ok_or_else(|| {
            CaptureError::InvalidState(format!("{} has no open device", self.camera))
        })?;

        let (cmd_sender, cmd_receiver) = mpsc::channel();
        let ctx = GrabLoopCtx {
            camera: self.camera,
            device,
            adapter: self.adapter.clone(),
            on_frame,
            cmd_receiver,
        };

        let handle = thread::Builder::new()
            .name(format!("grab-{}", self.camera))
            .spawn(move || run_grab_loop(ctx))?;

        self.cmd_sender = Some(cmd_sender);
        self.grab_thread = Some(handle);
        self.state = SessionState::Running;
        Ok(())
    }

    ///
    /// Stops the grab loop and releases the device. Safe to call in any state
    /// and any number of times.
    ///
    pub fn stop(&mut self) {
        if let Some(cmd_sender) = self.cmd_sender.take() {
            // the loop may already have exited, in which case it is gone
            let _ = cmd_sender.send(CameraSessionCmd::Stop);
        }
        if let Some(handle) = self.grab_thread.take() {
            match handle.join() {
                Ok(device) => self.device = Some(device),
                // the device was dropped, and with it closed, while unwinding
                Err(_) => log::error!("{}: grab loop panicked", self.camera),
            }
            self.state = SessionState::Stopped;
        }
        if let Some(mut device) = self.device.take().filter(|device| device.is_open()) {
            if let Err(err) = device.close() {
                log::error!("{}: failed to close device: {}", self.camera, err);
            }
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_grab_loop(mut ctx: GrabLoopCtx) -> Box<dyn ThermalDevice> {
    let crop = ctx.adapter.crop();
    let mut dropped_frames: u64 = 0;

    loop {
        match ctx.cmd_receiver.try_recv() {
            Ok(CameraSessionCmd::Stop) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let grabbed = match ctx.device.grab() {
            Ok(grabbed) => grabbed,
            Err(err) => {
                log::warn!("{}: failed to grab frame: {}", ctx.camera, err);
                thread::sleep(GRAB_ERROR_BACKOFF);
                continue;
            }
        };

        match RawFrame::decode_cropped(&grabbed.layout, &grabbed.data, crop) {
            Ok(frame) => (ctx.on_frame)(frame),
            Err(err) => {
                dropped_frames += 1;
                log::warn!(
                    "{}: dropping frame ({} dropped so far): {}",
                    ctx.camera,
                    dropped_frames,
                    err
                );
            }
        }
    }

    log::debug!("{}: grab loop finished", ctx.camera);
    ctx.device
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::{
        camera_adapter::default_adapter,
        device::synthetic::{SyntheticBackend, SyntheticCamera},
    };

    use super::*;

    fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_stop_without_start_is_harmless() {
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_device());
    }

    #[test]
    fn test_open_unknown_index_fails() {
        let backend = Arc::new(SyntheticBackend::new(vec![]));
        let mut session = CameraSession::new(CameraId::Camera2, default_adapter());
        let err = session.open(backend, 3, &RetryPolicy::once()).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable { index: 3, .. }));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_frames_are_cropped_and_delivered_in_order() {
        let camera = SyntheticCamera::lepton(30000);
        let stats = camera.stats.clone();
        let backend = Arc::new(SyntheticBackend::new(vec![camera]));
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        session.open(backend, 0, &RetryPolicy::once()).unwrap();
        session.configure_y16().unwrap();
        assert_eq!(session.state(), SessionState::Y16Configured);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        session
            .start(Box::new(move |frame: RawFrame| {
                sink.lock().unwrap().push((frame.width(), frame.height()));
            }))
            .unwrap();
        assert_eq!(session.state(), SessionState::Running);

        wait_for(|| received.lock().unwrap().len() >= 3);
        session.stop();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(stats.closes(), 1);
        let count = {
            let received = received.lock().unwrap();
            assert!(received.iter().all(|&dims| dims == (160, 120)));
            received.len()
        };
        // nothing arrives after stop returned
        thread::sleep(Duration::from_millis(30));
        assert_eq!(received.lock().unwrap().len(), count);
    }

    #[test]
    fn test_bad_frames_are_dropped_without_stopping() {
        let camera = SyntheticCamera::lepton(30000).corrupting_every(2);
        let stats = camera.stats.clone();
        let backend = Arc::new(SyntheticBackend::new(vec![camera]));
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        session.open(backend, 0, &RetryPolicy::once()).unwrap();
        session.configure_y16().unwrap();

        let delivered = Arc::new(Mutex::new(0u32));
        let sink = delivered.clone();
        session
            .start(Box::new(move |_| *sink.lock().unwrap() += 1))
            .unwrap();
        wait_for(|| *delivered.lock().unwrap() >= 3);
        session.stop();

        let delivered = *delivered.lock().unwrap() as u64;
        assert!(stats.frames() > delivered);
    }

    #[test]
    fn test_format_mismatch_is_not_fatal() {
        let mut camera = SyntheticCamera::lepton(30000).ignoring_format_requests();
        camera.native_format.frame_rate = 30;
        let backend = Arc::new(SyntheticBackend::new(vec![camera]));
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        session.open(backend, 0, &RetryPolicy::once()).unwrap();
        assert!(session.configure_y16().is_ok());
    }

    #[test]
    fn test_y16_delivered_as_yuyv_still_decodes() {
        let mut camera = SyntheticCamera::lepton(30000).ignoring_format_requests();
        camera.native_format.fourcc = FourCC::YUYV;
        let backend = Arc::new(SyntheticBackend::new(vec![camera]));
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        session.open(backend, 0, &RetryPolicy::once()).unwrap();
        session.configure_y16().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        session
            .start(Box::new(move |frame: RawFrame| {
                sink.lock().unwrap().push(frame.sample_at(0, 0));
            }))
            .unwrap();
        wait_for(|| !received.lock().unwrap().is_empty());
        session.stop();

        assert_eq!(received.lock().unwrap()[0], Some(30000));
    }

    #[test]
    fn test_open_retries_busy_device() {
        let camera = SyntheticCamera::lepton(30000).with_failed_opens(2);
        let stats = camera.stats.clone();
        let backend = Arc::new(SyntheticBackend::new(vec![camera]));
        let mut session = CameraSession::new(CameraId::Camera1, default_adapter());
        let retry = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
            attempt_timeout: Some(Duration::from_secs(1)),
        };
        session.open(backend, 0, &retry).unwrap();
        assert_eq!(stats.opens(), 3);
        assert!(session.has_device());
        session.stop();
        assert_eq!(stats.closes(), 1);
    }
}
