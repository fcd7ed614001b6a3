pub mod timer;

pub use timer::{FrameTimingStats, HighPrecisionTimer, ManualTimer, Timer};

/// Converts a nanosecond timestamp to seconds
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1e9
}
