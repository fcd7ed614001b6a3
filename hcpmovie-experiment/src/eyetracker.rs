use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("eye tracker unavailable: {0}")]
    Unavailable(String),

    #[error("eye tracker connection is closed")]
    Closed,
}

/// The eye tracker calls a session makes
pub trait EyeTracker: Send {
    fn name(&self) -> &str;
    fn calibrate(&mut self) -> Result<(), TrackerError>;
    fn start_recording(&mut self) -> Result<(), TrackerError>;
    fn stop_recording(&mut self) -> Result<(), TrackerError>;
    fn send_message(&mut self, message: &str) -> Result<(), TrackerError>;
    fn close(&mut self) -> Result<(), TrackerError>;
}

/// Used when eye tracking is off
#[derive(Debug, Default)]
pub struct NullTracker;

impl EyeTracker for NullTracker {
    fn name(&self) -> &str {
        "none"
    }

    fn calibrate(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }

    fn send_message(&mut self, _message: &str) -> Result<(), TrackerError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub calibrations: usize,
    pub recording: bool,
    pub closed: bool,
    pub messages: Vec<String>,
}

/// Shared view of what a `DummyTracker` received; stays readable after the
/// tracker itself is moved into a session
#[derive(Debug, Clone, Default)]
pub struct TrackerLog(Arc<Mutex<TrackerState>>);

impl TrackerLog {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> TrackerState {
        self.lock().clone()
    }
}

/// Dummy-mode tracker: accepts every call and keeps a record of it
#[derive(Debug)]
pub struct DummyTracker {
    address: String,
    log: TrackerLog,
}

impl DummyTracker {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            log: TrackerLog::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn log(&self) -> TrackerLog {
        self.log.clone()
    }

    fn open_state(&self) -> Result<MutexGuard<'_, TrackerState>, TrackerError> {
        let state = self.log.lock();
        if state.closed {
            return Err(TrackerError::Closed);
        }
        Ok(state)
    }
}

impl EyeTracker for DummyTracker {
    fn name(&self) -> &str {
        "dummy"
    }

    fn calibrate(&mut self) -> Result<(), TrackerError> {
        self.open_state()?.calibrations += 1;
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), TrackerError> {
        self.open_state()?.recording = true;
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), TrackerError> {
        self.open_state()?.recording = false;
        Ok(())
    }

    fn send_message(&mut self, message: &str) -> Result<(), TrackerError> {
        log::trace!("tracker message: {}", message);
        self.open_state()?.messages.push(message.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TrackerError> {
        let mut state = self.log.lock();
        state.recording = false;
        state.closed = true;
        Ok(())
    }
}

/// Picks the tracker for a run. There is no hardware binding, so asking for
/// the tracker runs it in dummy mode.
pub fn connect(eyetracker_on: bool, address: &str) -> Box<dyn EyeTracker> {
    if eyetracker_on {
        log::warn!(
            "No EyeLink connection available at {}, running the eye tracker in dummy mode",
            address
        );
        Box::new(DummyTracker::new(address))
    } else {
        log::info!("Eye tracking is off");
        Box::new(NullTracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_records_calls() {
        let mut tracker = DummyTracker::new("100.1.1.1");
        let log = tracker.log();

        tracker.calibrate().unwrap();
        tracker.start_recording().unwrap();
        tracker.send_message("start_type-stim_trial-0_phase-0").unwrap();

        let state = log.snapshot();
        assert_eq!(state.calibrations, 1);
        assert!(state.recording);
        assert_eq!(state.messages, vec!["start_type-stim_trial-0_phase-0"]);
    }

    #[test]
    fn dummy_rejects_calls_after_close() {
        let mut tracker = DummyTracker::new("100.1.1.1");
        tracker.start_recording().unwrap();
        tracker.close().unwrap();
        tracker.close().unwrap();

        assert_eq!(tracker.send_message("late"), Err(TrackerError::Closed));
        let state = tracker.log().snapshot();
        assert!(state.closed);
        assert!(!state.recording);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn connect_picks_implementation() {
        assert_eq!(connect(false, "100.1.1.1").name(), "none");
        assert_eq!(connect(true, "100.1.1.1").name(), "dummy");
    }

    #[test]
    fn null_tracker_accepts_everything() {
        let mut tracker = NullTracker;
        assert!(tracker.calibrate().is_ok());
        assert!(tracker.send_message("anything").is_ok());
        assert!(tracker.close().is_ok());
        assert!(tracker.send_message("after close").is_ok());
    }
}
