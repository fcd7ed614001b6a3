use crate::error::SessionError;
use crate::event_log::{EventLog, LogRecord};
use crate::eyetracker::EyeTracker;
use crate::geometry::DisplayGeometry;
use crate::paths::resolve_movie;
use crate::probe::DurationProbe;
use crate::settings::{ConfigError, SessionSettings, Settings};
use crate::trials::build_trials;
use hcpmovie_core::{
    Drawable, FixationLines, InputEvent, Layer, MovieStim, PhaseClock, TextStim, Transition,
    Trial,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-run command-line choices
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub subject: String,
    pub run: u32,
    pub eyetracker_on: bool,
    pub output_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            subject: "1".to_string(),
            run: 1,
            eyetracker_on: false,
            output_dir: PathBuf::from("logs"),
        }
    }
}

impl SessionOptions {
    /// Basename shared by every output file of the run
    pub fn output_str(&self) -> String {
        format!("sub-{}_run-{}_task-movie", self.subject, self.run)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieInfo {
    /// Position in `stimuli.movie_files`
    pub index: usize,
    pub path: PathBuf,
    pub duration: f64,
    pub muted: bool,
    pub stim: MovieStim,
}

/// Everything a run needs, resolved up front and read-only afterwards
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub settings: Settings,
    pub config: SessionSettings,
    pub options: SessionOptions,
    pub geometry: DisplayGeometry,
    pub fixation: FixationLines,
    pub report_fixation: FixationLines,
    pub movie: MovieInfo,
}

impl SessionContext {
    pub fn prepare(
        settings: Settings,
        options: SessionOptions,
        probe: &dyn DurationProbe,
    ) -> Result<Self, SessionError> {
        if options.run == 0 {
            return Err(SessionError::InvalidRun(options.run));
        }
        let config = SessionSettings::from_settings(&settings)?;
        if let Some(n_trials) = config.design.n_trials {
            log::debug!("Design lists {} movie trial(s) per run", n_trials);
        }

        let index = (options.run - 1) as usize;
        let movie_files = &config.stimuli.movie_files;
        let file_name = movie_files.get(index).ok_or_else(|| {
            ConfigError::invalid(
                "stimuli",
                "movie_files",
                format!(
                    "run {} needs movie #{} but only {} are listed",
                    options.run,
                    index + 1,
                    movie_files.len()
                ),
            )
        })?;

        let resolved = resolve_movie(&config.paths.candidates(), file_name)?;
        let duration = probe.probe_duration(&resolved.path)?;
        log::info!(
            "Movie duration for this run: {:.3}s ({})",
            duration,
            resolved.path.display()
        );

        let stimuli = &config.stimuli;
        let geometry = DisplayGeometry::new(stimuli.movie_size_pix, stimuli.shrink_factor);
        let fixation = FixationLines::new(
            geometry.scaled(stimuli.aperture_radius * 2.0),
            stimuli.fix_color,
            stimuli.fix_line_width as f32,
            geometry.shifted_pos,
        )
        .with_aperture(stimuli.draw_aperture);
        let report_fixation = FixationLines {
            size: geometry.scaled(stimuli.fix_radius * 2.0),
            ..fixation.clone()
        };

        let movie = MovieInfo {
            index,
            path: resolved.path,
            duration,
            muted: stimuli.movie_muted,
            stim: geometry.movie(),
        };

        Ok(Self {
            settings,
            config,
            options,
            geometry,
            fixation,
            report_fixation,
            movie,
        })
    }

    pub fn text_stim(&self, content: &str) -> TextStim {
        TextStim {
            content: content.to_string(),
            height: self.config.text.text_height as f32,
            wrap_width: self.config.text.text_width as f32,
            pos: self.geometry.shifted_pos,
            color: self.config.text.text_color,
        }
    }

    pub fn output_str(&self) -> String {
        self.options.output_str()
    }

    pub fn events_path(&self) -> PathBuf {
        self.options
            .output_dir
            .join(format!("{}_events.json", self.output_str()))
    }

    pub fn settings_copy_path(&self) -> PathBuf {
        self.options
            .output_dir
            .join(format!("{}_expsettings.toml", self.output_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Built but `start` not called yet
    NotStarted,
    Running,
    Finished,
    Aborted,
}

/// Runs the trials of one movie run in order and owns the eye tracker
/// until closed
pub struct Session {
    ctx: SessionContext,
    trials: Vec<Trial>,
    tracker: Box<dyn EyeTracker>,
    log: EventLog,

    status: SessionStatus,
    current: usize,
    start_time: f64,
    phase_start: f64,
    phase_frames: u64,
    open_phase_record: Option<usize>,
    closed: bool,
}

impl Session {
    /// Resolves, probes and builds everything before the first frame; a
    /// failure here means nothing was shown
    pub fn new(
        settings: Settings,
        options: SessionOptions,
        probe: &dyn DurationProbe,
        tracker: Box<dyn EyeTracker>,
    ) -> Result<Self, SessionError> {
        let ctx = SessionContext::prepare(settings, options, probe)?;
        let trials = build_trials(&ctx)?;
        log::info!(
            "Prepared {} trials for {} (eye tracker: {})",
            trials.len(),
            ctx.output_str(),
            tracker.name()
        );

        Ok(Self {
            ctx,
            trials,
            tracker,
            log: EventLog::new(),
            status: SessionStatus::NotStarted,
            current: 0,
            start_time: 0.0,
            phase_start: 0.0,
            phase_frames: 0,
            open_phase_record: None,
            closed: false,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        match self.status {
            SessionStatus::NotStarted | SessionStatus::Running => self.trials.get(self.current),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Calibrates and starts recording (eye tracker on), then begins the
    /// first trial at `now` seconds
    pub fn start(&mut self, now: f64) -> Result<(), SessionError> {
        if self.status != SessionStatus::NotStarted {
            log::warn!("Session already started");
            return Ok(());
        }
        if self.ctx.options.eyetracker_on {
            self.tracker.calibrate()?;
        }
        self.tracker.start_recording()?;

        self.start_time = now;
        self.status = SessionStatus::Running;
        log::info!("Experiment started");
        self.begin_phase(now);
        Ok(())
    }

    /// Handles the key presses since the last frame and moves the current
    /// trial on by at most one phase
    pub fn tick(&mut self, now: f64, events: &[InputEvent]) -> SessionStatus {
        if self.status != SessionStatus::Running {
            return self.status;
        }

        for event in events {
            self.record_key(event);
        }
        if events.iter().any(|e| e.key == self.ctx.config.quit_key) {
            log::warn!("Quit key pressed, aborting the session");
            self.end_phase();
            self.status = SessionStatus::Aborted;
            return self.status;
        }

        self.phase_frames += 1;
        let Some(trial) = self.trials.get_mut(self.current) else {
            self.status = SessionStatus::Finished;
            return self.status;
        };
        let clock = PhaseClock::new(now - self.phase_start, self.phase_frames);
        let transition = trial.advance(clock, events);
        trial.apply(transition);

        match transition {
            Transition::Hold => {}
            Transition::Advance { .. } => {
                self.end_phase();
                self.begin_phase(now);
            }
            Transition::Terminate => {
                self.end_phase();
                log::debug!("Trial {} finished", self.current);
                self.current += 1;
                if self.current < self.trials.len() {
                    self.begin_phase(now);
                } else {
                    log::info!("All trials finished");
                    self.status = SessionStatus::Finished;
                }
            }
        }
        self.status
    }

    /// Ends the run early, e.g. when the window is closed
    pub fn abort(&mut self) {
        if matches!(
            self.status,
            SessionStatus::NotStarted | SessionStatus::Running
        ) {
            log::warn!("Session aborted");
            self.end_phase();
            self.status = SessionStatus::Aborted;
        }
    }

    /// What to draw for the current phase, back to front
    pub fn scene(&self) -> Vec<Drawable<'_>> {
        let Some(trial) = self.current_trial() else {
            return Vec::new();
        };
        trial
            .layers()
            .into_iter()
            .filter_map(|layer| match layer {
                Layer::Fixation => Some(Drawable::Fixation(&self.ctx.fixation)),
                Layer::ReportFixation => Some(Drawable::Fixation(&self.ctx.report_fixation)),
                Layer::Text => trial
                    .text()
                    .filter(|t| !t.is_empty())
                    .map(Drawable::Text),
                Layer::Movie => Some(Drawable::Movie(&self.ctx.movie.stim)),
            })
            .collect()
    }

    pub fn shows_movie(&self) -> bool {
        self.current_trial()
            .map(|t| t.layers().contains(&Layer::Movie))
            .unwrap_or(false)
    }

    /// Stops recording, releases the tracker and writes the results. Only
    /// the first call does anything.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.end_phase();

        let tracker_result = self
            .tracker
            .stop_recording()
            .and_then(|_| self.tracker.close());
        if let Err(e) = &tracker_result {
            log::error!("Failed to shut down the eye tracker: {}", e);
        }

        self.write_outputs()?;
        tracker_result?;
        Ok(())
    }

    fn write_outputs(&self) -> Result<(), SessionError> {
        let output_dir = &self.ctx.options.output_dir;
        fs::create_dir_all(output_dir).map_err(|source| SessionError::Output {
            path: output_dir.clone(),
            source,
        })?;

        let events_path = self.ctx.events_path();
        log::info!("Writing results to {}", events_path.display());
        self.log
            .write_json(&events_path)
            .map_err(|source| output_error(&events_path, source))?;

        let settings_path = self.ctx.settings_copy_path();
        fs::write(&settings_path, self.ctx.settings.to_toml_string())
            .map_err(|source| output_error(&settings_path, source))?;
        Ok(())
    }

    fn begin_phase(&mut self, now: f64) {
        self.phase_start = now;
        self.phase_frames = 0;

        let Some(trial) = self.trials.get(self.current) else {
            return;
        };
        let phase = trial.current_phase();
        let record = LogRecord {
            trial_nr: trial.index(),
            onset: now - self.start_time,
            event_type: trial.phase_name().unwrap_or("stim").to_string(),
            phase,
            response: None,
            nr_frames: None,
            parameters: trial.parameters().clone(),
        };
        let message = format!("start_type-stim_trial-{}_phase-{}", trial.index(), phase);

        self.open_phase_record = Some(self.log.push(record));
        self.send_tracker_message(&message);
    }

    fn end_phase(&mut self) {
        let Some(index) = self.open_phase_record.take() else {
            return;
        };
        if let Some(record) = self.log.get_mut(index) {
            record.nr_frames = Some(self.phase_frames);
        }
    }

    fn record_key(&mut self, event: &InputEvent) {
        let Some(trial) = self.trials.get(self.current) else {
            return;
        };
        let event_type = if event.key == self.ctx.config.trigger_key {
            "pulse"
        } else {
            "response"
        };
        let onset = event.timestamp - self.start_time;
        let phase = trial.current_phase();
        let message = format!(
            "start_type-{}_trial-{}_phase-{}_key-{}_time-{:.4}",
            event_type,
            trial.index(),
            phase,
            event.key,
            onset
        );
        self.log.push(LogRecord {
            trial_nr: trial.index(),
            onset,
            event_type: event_type.to_string(),
            phase,
            response: Some(event.key.to_string()),
            nr_frames: None,
            parameters: trial.parameters().clone(),
        });
        self.send_tracker_message(&message);
    }

    fn send_tracker_message(&mut self, message: &str) {
        if let Err(e) = self.tracker.send_message(message) {
            log::warn!("Eye tracker message dropped: {}", e);
        }
    }
}

fn output_error(path: &Path, source: std::io::Error) -> SessionError {
    SessionError::Output {
        path: path.to_path_buf(),
        source,
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to close session: {}", e);
        }
    }
}
