use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed on {path}: {stderr}")]
    Failed {
        program: String,
        path: String,
        stderr: String,
    },

    #[error("could not parse a duration from probe output {0:?}")]
    Unparseable(String),

    #[error("probed duration {0} is not a finite non-negative number")]
    InvalidDuration(f64),
}

/// Reports the duration of a media file in seconds
pub trait DurationProbe {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Queries durations with the ffprobe command-line tool
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DurationProbe for FfprobeProbe {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        log::debug!("Probing duration of {}", path.display());
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                program: self.program.clone(),
                path: path.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the first non-empty line of probe output as seconds
pub fn parse_duration_output(raw: &str) -> Result<f64, ProbeError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let secs = line
        .parse::<f64>()
        .map_err(|_| ProbeError::Unparseable(line.to_string()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ProbeError::InvalidDuration(secs));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_line() {
        assert_eq!(parse_duration_output("120.045000\n").unwrap(), 120.045);
        assert_eq!(parse_duration_output("\n  42\nN/A\n").unwrap(), 42.0);
    }

    #[test]
    fn rejects_non_numbers() {
        assert!(matches!(
            parse_duration_output("N/A\n"),
            Err(ProbeError::Unparseable(s)) if s == "N/A"
        ));
        assert!(matches!(parse_duration_output(""), Err(ProbeError::Unparseable(_))));
    }

    #[test]
    fn rejects_impossible_durations() {
        assert!(matches!(
            parse_duration_output("-1.5"),
            Err(ProbeError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_output("inf"),
            Err(ProbeError::InvalidDuration(_))
        ));
    }

    #[test]
    fn missing_tool_is_a_spawn_error() {
        let probe = FfprobeProbe::with_program("hcpmovie-no-such-ffprobe");
        let err = probe.probe_duration(Path::new("movie.mp4")).unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_failure() {
        let probe = FfprobeProbe::with_program("false");
        let err = probe.probe_duration(Path::new("movie.mp4")).unwrap_err();
        assert!(matches!(err, ProbeError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unexpected_output_is_unparseable() {
        // echo prints its arguments back
        let probe = FfprobeProbe::with_program("echo");
        let err = probe.probe_duration(Path::new("movie.mp4")).unwrap_err();
        assert!(matches!(err, ProbeError::Unparseable(_)));
    }
}
