use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    errors::{CaptureError, Result},
    recorders::recording_sequencer::RecordingSession,
};

#[derive(Debug, Clone)]
pub enum CaptureState {
    Idle,
    Capturing,
    Recording(Arc<RecordingSession>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Capturing,
    Recording,
}

impl CaptureState {
    pub fn phase(&self) -> CapturePhase {
        match self {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::Capturing => CapturePhase::Capturing,
            CaptureState::Recording(_) => CapturePhase::Recording,
        }
    }
}

///
/// Idle -> Capturing -> Recording -> Capturing -> Idle.
///
/// Frame writers look at the state through `with_recording`, which holds the
/// read lock for the whole write. Every transition takes the write lock, so
/// ending a recording waits until the writes in flight have finished.
///
pub struct CaptureStateMachine {
    state: RwLock<CaptureState>,
}

impl Default for CaptureStateMachine {
    fn default() -> Self {
        Self {
            state: RwLock::new(CaptureState::Idle),
        }
    }
}

impl CaptureStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CaptureState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CaptureState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn phase(&self) -> CapturePhase {
        self.read().phase()
    }

    pub fn recording(&self) -> Option<Arc<RecordingSession>> {
        match &*self.read() {
            CaptureState::Recording(session) => Some(session.clone()),
            _ => None,
        }
    }

    //
    // Idle -> Capturing. Already capturing or recording is left as is.
    //
    pub fn begin_capture(&self) {
        let mut state = self.write();
        if let CaptureState::Idle = *state {
            *state = CaptureState::Capturing;
        }
    }

    //
    // Any -> Idle. Returns the session that was being recorded, if any,
    // so the caller can close it.
    //
    pub fn end_capture(&self) -> Option<Arc<RecordingSession>> {
        let mut state = self.write();
        match std::mem::replace(&mut *state, CaptureState::Idle) {
            CaptureState::Recording(session) => Some(session),
            _ => None,
        }
    }

    ///
    /// Capturing -> Recording. `create` runs under the write lock, so no two
    /// recordings can be started at once.
    ///
    pub fn begin_recording<F>(&self, create: F) -> Result<Arc<RecordingSession>>
    where
        F: FnOnce() -> Result<Arc<RecordingSession>>,
    {
        let mut state = self.write();
        match *state {
            CaptureState::Capturing => {}
            CaptureState::Idle => {
                return Err(CaptureError::InvalidState(
                    "cannot record while not capturing".to_string(),
                ))
            }
            CaptureState::Recording(_) => {
                return Err(CaptureError::InvalidState(
                    "already recording".to_string(),
                ))
            }
        }
        let session = create()?;
        *state = CaptureState::Recording(session.clone());
        Ok(session)
    }

    //
    // Recording -> Capturing.
    //
    pub fn end_recording(&self) -> Option<Arc<RecordingSession>> {
        let mut state = self.write();
        if !matches!(*state, CaptureState::Recording(_)) {
            return None;
        }
        match std::mem::replace(&mut *state, CaptureState::Capturing) {
            CaptureState::Recording(session) => Some(session),
            _ => None,
        }
    }

    //
    // Ends the recording only if `session` is still the active one. A frame
    // thread that hit a vanished directory must not stop a newer recording.
    //
    pub fn abort_recording(&self, session: &Arc<RecordingSession>) -> bool {
        let mut state = self.write();
        match &*state {
            CaptureState::Recording(active) if Arc::ptr_eq(active, session) => {
                *state = CaptureState::Capturing;
                true
            }
            _ => false,
        }
    }

    ///
    /// Runs `f` with the active recording session while holding the read
    /// lock. Returns `None` when not recording.
    ///
    pub fn with_recording<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&Arc<RecordingSession>) -> T,
    {
        match &*self.read() {
            CaptureState::Recording(session) => Some(f(session)),
            _ => None,
        }
    }
}
