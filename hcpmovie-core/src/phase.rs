use serde::{Deserialize, Serialize};

/// How long a single phase of a trial lasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PhaseDuration {
    Seconds(f64),
    Frames(u64),
    /// Only an input event ends the phase
    Unbounded,
}

impl PhaseDuration {
    /// Builds a duration in seconds; `+inf` means "wait for an event".
    /// Returns `None` for negative or NaN input.
    pub fn seconds(secs: f64) -> Option<Self> {
        if secs.is_nan() || secs < 0.0 {
            None
        } else if secs.is_infinite() {
            Some(PhaseDuration::Unbounded)
        } else {
            Some(PhaseDuration::Seconds(secs))
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, PhaseDuration::Unbounded)
    }

    pub fn as_secs(&self) -> Option<f64> {
        match self {
            PhaseDuration::Seconds(s) => Some(*s),
            _ => None,
        }
    }

    /// True once `clock` has reached this duration
    pub fn elapsed_by(&self, clock: PhaseClock) -> bool {
        match self {
            PhaseDuration::Seconds(s) => clock.elapsed_secs >= *s,
            PhaseDuration::Frames(n) => clock.frames >= *n,
            PhaseDuration::Unbounded => false,
        }
    }
}

/// Time spent in the current phase, in wall-clock seconds and rendered frames
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseClock {
    pub elapsed_secs: f64,
    pub frames: u64,
}

impl PhaseClock {
    pub fn new(elapsed_secs: f64, frames: u64) -> Self {
        Self {
            elapsed_secs,
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_seconds_become_unbounded() {
        assert_eq!(
            PhaseDuration::seconds(f64::INFINITY),
            Some(PhaseDuration::Unbounded)
        );
        assert_eq!(PhaseDuration::seconds(2.5), Some(PhaseDuration::Seconds(2.5)));
        assert_eq!(PhaseDuration::seconds(0.0), Some(PhaseDuration::Seconds(0.0)));
    }

    #[test]
    fn negative_and_nan_are_rejected() {
        assert!(PhaseDuration::seconds(-1.0).is_none());
        assert!(PhaseDuration::seconds(f64::NAN).is_none());
    }

    #[test]
    fn frames_count_against_the_frame_counter() {
        let d = PhaseDuration::Frames(3);
        assert!(!d.elapsed_by(PhaseClock::new(100.0, 2)));
        assert!(d.elapsed_by(PhaseClock::new(0.0, 3)));
    }

    #[test]
    fn unbounded_never_elapses() {
        assert!(!PhaseDuration::Unbounded.elapsed_by(PhaseClock::new(f64::MAX, u64::MAX)));
    }
}
