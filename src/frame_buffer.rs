use std::sync::{Arc, RwLock};

use crate::{thermal_data::RawFrame, types::camera_id::CameraId};

///
/// Holds the most recent frame of each camera.
///
/// Frames are published as immutable `Arc`s: `update` swaps the slot under a
/// short write lock and `snapshot` hands out a clone of the pointer, so a
/// reader keeps a consistent frame even while newer frames arrive.
///
#[derive(Default)]
pub struct FrameBuffer {
    slots: [RwLock<Option<Arc<RawFrame>>>; 2],
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, camera: CameraId, frame: impl Into<Arc<RawFrame>>) {
        let frame = frame.into();
        let mut slot = self.slots[camera.slot()]
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(frame);
    }

    pub fn snapshot(&self, camera: CameraId) -> Option<Arc<RawFrame>> {
        self.slots[camera.slot()]
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self, camera: CameraId) {
        *self.slots[camera.slot()]
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_empty_until_first_update() {
        let buffer = FrameBuffer::new();
        assert!(buffer.snapshot(CameraId::Camera1).is_none());
        buffer.update(CameraId::Camera1, RawFrame::filled(2, 2, 7));
        assert_eq!(
            buffer.snapshot(CameraId::Camera1).unwrap().sample_at(0, 0),
            Some(7)
        );
        assert!(buffer.snapshot(CameraId::Camera2).is_none());
    }

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let buffer = FrameBuffer::new();
        buffer.update(CameraId::Camera2, RawFrame::filled(2, 2, 1));
        let held = buffer.snapshot(CameraId::Camera2).unwrap();
        buffer.update(CameraId::Camera2, RawFrame::filled(2, 2, 2));
        assert_eq!(held.samples(), &[1, 1, 1, 1]);
        assert_eq!(
            buffer.snapshot(CameraId::Camera2).unwrap().samples(),
            &[2, 2, 2, 2]
        );
        buffer.clear(CameraId::Camera2);
        assert!(buffer.snapshot(CameraId::Camera2).is_none());
    }

    #[test]
    fn test_readers_never_see_mixed_frames() {
        let buffer = Arc::new(FrameBuffer::new());
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for value in 0..500u16 {
                    buffer.update(CameraId::Camera1, RawFrame::filled(16, 16, value));
                }
            })
        };
        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    if let Some(frame) = buffer.snapshot(CameraId::Camera1) {
                        let first = frame.samples()[0];
                        assert!(frame.samples().iter().all(|&s| s == first));
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }
}
