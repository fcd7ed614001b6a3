pub mod error;
pub mod event_log;
pub mod eyetracker;
pub mod geometry;
pub mod paths;
pub mod probe;
pub mod session;
pub mod settings;
pub mod trials;

pub use error::SessionError;
pub use event_log::{EventLog, LogRecord};
pub use eyetracker::{DummyTracker, EyeTracker, NullTracker, TrackerError, TrackerLog};
pub use geometry::DisplayGeometry;
pub use paths::{ResolveError, ResolvedMovie, resolve_movie};
pub use probe::{DurationProbe, FfprobeProbe, ProbeError};
pub use session::{MovieInfo, Session, SessionContext, SessionOptions, SessionStatus};
pub use settings::{ConfigError, SessionSettings, Settings};
