use crate::eyetracker::TrackerError;
use crate::paths::ResolveError;
use crate::probe::ProbeError;
use crate::settings::ConfigError;
use hcpmovie_core::TrialError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PathResolution(#[from] ResolveError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("invalid run number {0}, runs start at 1")]
    InvalidRun(u32),

    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
