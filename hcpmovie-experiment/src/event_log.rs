use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One row of the session's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub trial_nr: usize,
    /// Seconds since experiment start
    pub onset: f64,
    /// Phase name for onsets, `pulse` or `response` for key events
    pub event_type: String,
    pub phase: usize,
    pub response: Option<String>,
    pub nr_frames: Option<u64>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<LogRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns its position
    pub fn push(&mut self, record: LogRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LogRecord> {
        self.records.get_mut(index)
    }

    /// Records for phase onsets only, skipping key events
    pub fn onsets(&self) -> impl Iterator<Item = &LogRecord> {
        self.records
            .iter()
            .filter(|r| r.event_type != "pulse" && r.event_type != "response")
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.records)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(trial_nr: usize, onset: f64, event_type: &str) -> LogRecord {
        LogRecord {
            trial_nr,
            onset,
            event_type: event_type.to_string(),
            phase: 0,
            response: None,
            nr_frames: None,
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn onsets_skip_key_events() {
        let mut log = EventLog::new();
        log.push(record(0, 0.0, "stim"));
        log.push(record(0, 0.5, "response"));
        log.push(record(1, 0.5, "stim"));
        log.push(record(1, 1.0, "pulse"));

        let onsets: Vec<f64> = log.onsets().map(|r| r.onset).collect();
        assert_eq!(onsets, vec![0.0, 0.5]);
    }

    #[test]
    fn written_as_json_array_with_flat_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub-1_run-1_task-movie_events.json");

        let mut log = EventLog::new();
        let mut movie = record(2, 8.0, "movie");
        movie.parameters.insert("movie".into(), Value::from(1));
        movie.parameters.insert("movie_duration".into(), Value::from(120.0));
        let index = log.push(movie);
        log.get_mut(index).unwrap().nr_frames = Some(7200);
        log.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        let row = &parsed[0];
        assert_eq!(row["trial_nr"], 2);
        assert_eq!(row["event_type"], "movie");
        assert_eq!(row["nr_frames"], 7200);
        assert_eq!(row["movie_duration"], 120.0);
        assert!(row["response"].is_null());
    }
}
