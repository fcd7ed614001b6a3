use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("none of the stimulus directories exist (tried {})", display_list(.tried))]
    NoCandidate { tried: Vec<PathBuf> },
}

fn display_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMovie {
    pub path: PathBuf,
    pub directory: PathBuf,
    /// Position of `directory` in the candidate list
    pub candidate: usize,
}

/// Joins `file_name` onto the first candidate directory that exists.
/// Only the directory is checked; a missing file surfaces when probed.
pub fn resolve_movie<P: AsRef<Path>>(
    candidates: &[P],
    file_name: &str,
) -> Result<ResolvedMovie, ResolveError> {
    let found = candidates
        .iter()
        .map(AsRef::as_ref)
        .enumerate()
        .find(|(_, dir)| dir.is_dir());

    let Some((candidate, directory)) = found else {
        return Err(ResolveError::NoCandidate {
            tried: candidates.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        });
    };

    if candidate == 0 {
        log::info!("Using stimulus directory {}", directory.display());
    } else {
        log::warn!(
            "Primary stimulus directory {} not found, falling back to {}",
            candidates[0].as_ref().display(),
            directory.display()
        );
    }

    Ok(ResolvedMovie {
        path: directory.join(file_name),
        directory: directory.to_path_buf(),
        candidate,
    })
}
