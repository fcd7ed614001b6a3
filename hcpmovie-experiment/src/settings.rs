use hcpmovie_core::{Key, Rgba};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
pub const DEFAULT_TRACKER_ADDRESS: &str = "100.1.1.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings ({origin}): {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("settings section [{section}] not found")]
    SectionNotFound { section: String },

    #[error("settings key {section}.{key} not found")]
    KeyNotFound { section: String, key: String },

    #[error("settings key {section}.{key} should be {expected}")]
    WrongType {
        section: String,
        key: String,
        expected: &'static str,
    },

    #[error("settings key {section}.{key} is invalid: {reason}")]
    Invalid {
        section: String,
        key: String,
        reason: String,
    },
}

impl ConfigError {
    fn wrong_type(section: &str, key: &str, expected: &'static str) -> Self {
        ConfigError::WrongType {
            section: section.to_string(),
            key: key.to_string(),
            expected,
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

/// Experiment settings: sections of key/value pairs, read-only after load
#[derive(Debug, Clone, Default)]
pub struct Settings {
    table: Table,
    path: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = contents
            .parse::<Table>()
            .map_err(|source| ConfigError::Parse {
                origin: path.display().to_string(),
                source,
            })?;

        log::info!("Loaded settings from {}", path.display());
        Ok(Self {
            table,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table = text.parse::<Table>().map_err(|source| ConfigError::Parse {
            origin: "inline".to_string(),
            source,
        })?;
        Ok(Self { table, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn to_toml_string(&self) -> String {
        self.table.to_string()
    }

    pub fn section(&self, section: &str) -> Result<&Table, ConfigError> {
        self.table
            .get(section)
            .and_then(Value::as_table)
            .ok_or_else(|| ConfigError::SectionNotFound {
                section: section.to_string(),
            })
    }

    pub fn value(&self, section: &str, key: &str) -> Result<&Value, ConfigError> {
        self.section(section)?
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Like `value`, but a missing section or key is `None`
    fn opt_value(&self, section: &str, key: &str) -> Option<&Value> {
        self.table
            .get(section)
            .and_then(Value::as_table)
            .and_then(|t| t.get(key))
    }

    pub fn get_f64(&self, section: &str, key: &str) -> Result<f64, ConfigError> {
        let value = self.value(section, key)?;
        as_f64(value).ok_or_else(|| ConfigError::wrong_type(section, key, "a number"))
    }

    pub fn opt_f64(&self, section: &str, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.opt_value(section, key) {
            None => Ok(None),
            Some(v) => as_f64(v)
                .map(Some)
                .ok_or_else(|| ConfigError::wrong_type(section, key, "a number")),
        }
    }

    pub fn get_str(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.value(section, key)?
            .as_str()
            .ok_or_else(|| ConfigError::wrong_type(section, key, "a string"))
    }

    pub fn opt_str(&self, section: &str, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.opt_value(section, key) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| ConfigError::wrong_type(section, key, "a string")),
        }
    }

    pub fn get_u32(&self, section: &str, key: &str) -> Result<u32, ConfigError> {
        let value = self.value(section, key)?;
        Self::u32_value(value)
            .ok_or_else(|| ConfigError::wrong_type(section, key, "a non-negative integer"))
    }

    pub fn opt_u32(&self, section: &str, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.opt_value(section, key) {
            None => Ok(None),
            Some(v) => Self::u32_value(v)
                .map(Some)
                .ok_or_else(|| ConfigError::wrong_type(section, key, "a non-negative integer")),
        }
    }

    fn u32_value(value: &Value) -> Option<u32> {
        value.as_integer().and_then(|i| u32::try_from(i).ok())
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool, ConfigError> {
        self.value(section, key)?
            .as_bool()
            .ok_or_else(|| ConfigError::wrong_type(section, key, "a boolean"))
    }

    pub fn opt_bool(&self, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.opt_value(section, key) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| ConfigError::wrong_type(section, key, "a boolean")),
        }
    }

    pub fn get_f64_list(&self, section: &str, key: &str) -> Result<Vec<f64>, ConfigError> {
        let value = self.value(section, key)?;
        Self::f64_list(value)
            .ok_or_else(|| ConfigError::wrong_type(section, key, "a list of numbers"))
    }

    pub fn opt_f64_list(&self, section: &str, key: &str) -> Result<Option<Vec<f64>>, ConfigError> {
        match self.opt_value(section, key) {
            None => Ok(None),
            Some(v) => Self::f64_list(v)
                .map(Some)
                .ok_or_else(|| ConfigError::wrong_type(section, key, "a list of numbers")),
        }
    }

    fn f64_list(value: &Value) -> Option<Vec<f64>> {
        value.as_array()?.iter().map(as_f64).collect()
    }

    pub fn get_str_list(&self, section: &str, key: &str) -> Result<Vec<String>, ConfigError> {
        self.value(section, key)?
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| ConfigError::wrong_type(section, key, "a list of strings"))
    }

    /// A color as `[r, g, b]` in the signed `[-1, 1]` range or `#rrggbb`
    pub fn opt_color(&self, section: &str, key: &str) -> Result<Option<Rgba>, ConfigError> {
        let Some(value) = self.opt_value(section, key) else {
            return Ok(None);
        };
        let color = if let Some(hex) = value.as_str() {
            Rgba::from_hex(hex)
        } else {
            Self::f64_list(value)
                .and_then(|v| <[f64; 3]>::try_from(v).ok())
                .and_then(Rgba::from_signed_rgb)
        };
        color.map(Some).ok_or_else(|| {
            ConfigError::invalid(section, key, "expected [r, g, b] in [-1, 1] or a #rrggbb string")
        })
    }

    pub fn get_color(&self, section: &str, key: &str) -> Result<Rgba, ConfigError> {
        self.value(section, key)?;
        self.opt_color(section, key)?.ok_or_else(|| ConfigError::KeyNotFound {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    pub fn opt_key(&self, section: &str, key: &str) -> Result<Option<Key>, ConfigError> {
        match self.opt_str(section, key)? {
            None => Ok(None),
            Some(name) => name
                .parse::<Key>()
                .map(Some)
                .map_err(|reason| ConfigError::invalid(section, key, reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignSettings {
    pub start_duration: f64,
    pub end_duration: f64,
    pub fix_movie_interval: f64,
    pub n_trials: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StimulusSettings {
    pub movie_files: Vec<String>,
    pub movie_size_pix: [f64; 2],
    pub shrink_factor: f64,
    pub aperture_radius: f64,
    pub fix_radius: f64,
    pub fix_color: Rgba,
    pub fix_line_width: f64,
    pub draw_aperture: bool,
    pub movie_muted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSettings {
    pub stimuli_path: PathBuf,
    pub stimuli_path_spinoza1: PathBuf,
    pub stimuli_path_spinoza2: PathBuf,
}

impl PathSettings {
    /// Stimulus directories in priority order
    pub fn candidates(&self) -> [&Path; 3] {
        [
            &self.stimuli_path,
            &self.stimuli_path_spinoza1,
            &self.stimuli_path_spinoza2,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSettings {
    pub text_height: f64,
    pub text_width: f64,
    pub text_color: Rgba,
    pub font_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub size: [u32; 2],
    pub fullscreen: bool,
    pub color: Rgba,
}

/// Typed, validated view over `Settings` used to build a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub design: DesignSettings,
    pub stimuli: StimulusSettings,
    pub paths: PathSettings,
    pub text: TextSettings,
    pub window: WindowSettings,
    pub trigger_key: Key,
    pub quit_key: Key,
    pub tracker_address: String,
}

fn duration(settings: &Settings, section: &str, key: &str) -> Result<f64, ConfigError> {
    let value = settings.get_f64(section, key)?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            section,
            key,
            format!("{} is not a non-negative number of seconds", value),
        ));
    }
    Ok(value)
}

fn positive(settings: &Settings, section: &str, key: &str) -> Result<f64, ConfigError> {
    let value = settings.get_f64(section, key)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(section, key, format!("{} must be positive", value)));
    }
    Ok(value)
}

fn pair(section: &str, key: &str, values: Vec<f64>) -> Result<[f64; 2], ConfigError> {
    let pair = <[f64; 2]>::try_from(values)
        .map_err(|v| ConfigError::invalid(section, key, format!("expected 2 values, got {}", v.len())))?;
    if pair.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(ConfigError::invalid(section, key, "sizes must be positive"));
    }
    Ok(pair)
}

impl SessionSettings {
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let design = DesignSettings {
            start_duration: duration(s, "design", "start_duration")?,
            end_duration: duration(s, "design", "end_duration")?,
            fix_movie_interval: duration(s, "design", "fix_movie_interval")?,
            n_trials: s.opt_u32("design", "n_trials")?,
        };

        let shrink_factor = s.get_f64("stimuli", "shrink_factor")?;
        if !(shrink_factor > 0.0 && shrink_factor <= 1.0) {
            return Err(ConfigError::invalid(
                "stimuli",
                "shrink_factor",
                format!("{} is outside (0, 1]", shrink_factor),
            ));
        }

        let stimuli = StimulusSettings {
            movie_files: s.get_str_list("stimuli", "movie_files")?,
            movie_size_pix: pair(
                "stimuli",
                "movie_size_pix",
                s.get_f64_list("stimuli", "movie_size_pix")?,
            )?,
            shrink_factor,
            aperture_radius: positive(s, "stimuli", "aperture_radius")?,
            fix_radius: positive(s, "stimuli", "fix_radius")?,
            fix_color: s.get_color("stimuli", "fix_color")?,
            fix_line_width: positive(s, "stimuli", "fix_line_width")?,
            draw_aperture: s.opt_bool("stimuli", "draw_aperture")?.unwrap_or(false),
            movie_muted: s.opt_bool("stimuli", "movie_muted")?.unwrap_or(false),
        };

        let paths = PathSettings {
            stimuli_path: s.get_str("paths", "stimuli_path")?.into(),
            stimuli_path_spinoza1: s.get_str("paths", "stimuli_path_spinoza1")?.into(),
            stimuli_path_spinoza2: s.get_str("paths", "stimuli_path_spinoza2")?.into(),
        };

        let text = TextSettings {
            text_height: positive(s, "various", "text_height")?,
            text_width: positive(s, "various", "text_width")?,
            text_color: s.opt_color("various", "text_color")?.unwrap_or(Rgba::WHITE),
            font_path: s
                .opt_str("various", "font_path")?
                .unwrap_or(DEFAULT_FONT_PATH)
                .into(),
        };

        let size = match s.opt_f64_list("window", "size")? {
            Some(v) => {
                let [w, h] = pair("window", "size", v)?;
                [w as u32, h as u32]
            }
            None => [1920, 1080],
        };
        let window = WindowSettings {
            size,
            fullscreen: s.opt_bool("window", "fullscreen")?.unwrap_or(true),
            color: s.opt_color("window", "color")?.unwrap_or(Rgba::GRAY),
        };

        Ok(Self {
            design,
            stimuli,
            paths,
            text,
            window,
            trigger_key: s.opt_key("mri", "sync")?.unwrap_or(Key::Char('t')),
            quit_key: s.opt_key("keyboard", "quit")?.unwrap_or(Key::Char('q')),
            tracker_address: s
                .opt_str("eyetracker", "address")?
                .unwrap_or(DEFAULT_TRACKER_ADDRESS)
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
[design]
start_duration = 5
end_duration = 3.0
fix_movie_interval = 2
n_trials = 1

[stimuli]
movie_files = ["movie_1.mp4", "movie_2.mp4"]
movie_size_pix = [1920, 1080]
shrink_factor = 0.75
aperture_radius = 300
fix_radius = 8
fix_color = [-1, -1, -1]
fix_line_width = 2

[paths]
stimuli_path = "/data/stimuli"
stimuli_path_spinoza1 = "/spinoza/one"
stimuli_path_spinoza2 = "/spinoza/two"

[various]
text_height = 30
text_width = 900
"#;

    fn settings() -> Settings {
        Settings::from_toml_str(SETTINGS).unwrap()
    }

    #[test]
    fn nested_lookup() {
        let s = settings();
        assert_eq!(s.get_f64("design", "start_duration").unwrap(), 5.0);
        assert_eq!(s.get_str("paths", "stimuli_path").unwrap(), "/data/stimuli");
        assert_eq!(
            s.get_str_list("stimuli", "movie_files").unwrap(),
            vec!["movie_1.mp4", "movie_2.mp4"]
        );
        assert_eq!(s.get_f64_list("stimuli", "movie_size_pix").unwrap(), vec![1920.0, 1080.0]);
    }

    #[test]
    fn integers_and_booleans() {
        let text = format!("{}\n[window]\nfullscreen = false\n", SETTINGS);
        let s = Settings::from_toml_str(&text).unwrap();
        assert_eq!(s.get_u32("design", "n_trials").unwrap(), 1);
        assert!(!s.get_bool("window", "fullscreen").unwrap());
        assert!(matches!(
            s.get_u32("design", "end_duration"),
            Err(ConfigError::WrongType { .. })
        ));
        assert_eq!(s.opt_u32("design", "missing").unwrap(), None);
    }

    #[test]
    fn missing_section_and_key() {
        let s = settings();
        assert!(matches!(
            s.get_f64("mri", "TR"),
            Err(ConfigError::SectionNotFound { section }) if section == "mri"
        ));
        assert!(matches!(
            s.get_f64("design", "iti"),
            Err(ConfigError::KeyNotFound { section, key }) if section == "design" && key == "iti"
        ));
        assert_eq!(s.opt_f64("design", "iti").unwrap(), None);
        assert_eq!(s.opt_str("nothing", "here").unwrap(), None);
    }

    #[test]
    fn wrong_types_are_reported() {
        let s = settings();
        assert!(matches!(
            s.get_str("design", "start_duration"),
            Err(ConfigError::WrongType { expected: "a string", .. })
        ));
        assert!(matches!(
            s.opt_bool("various", "text_height"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(s.get_f64_list("paths", "stimuli_path").is_err());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = Settings::from_toml_str("[design\nstart_duration = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Settings::load("/nonexistent/settings.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn session_settings_with_defaults() {
        let cfg = SessionSettings::from_settings(&settings()).unwrap();
        assert_eq!(cfg.design.start_duration, 5.0);
        assert_eq!(cfg.design.fix_movie_interval, 2.0);
        assert_eq!(cfg.design.n_trials, Some(1));
        assert_eq!(cfg.stimuli.fix_color, Rgba::BLACK);
        assert_eq!(cfg.stimuli.movie_size_pix, [1920.0, 1080.0]);
        assert!(!cfg.stimuli.movie_muted);
        assert_eq!(cfg.trigger_key, Key::Char('t'));
        assert_eq!(cfg.quit_key, Key::Char('q'));
        assert_eq!(cfg.window.size, [1920, 1080]);
        assert!(cfg.window.fullscreen);
        assert_eq!(cfg.window.color, Rgba::GRAY);
        assert_eq!(cfg.text.text_color, Rgba::WHITE);
        assert_eq!(cfg.tracker_address, DEFAULT_TRACKER_ADDRESS);
        assert_eq!(
            cfg.paths.candidates(),
            [
                Path::new("/data/stimuli"),
                Path::new("/spinoza/one"),
                Path::new("/spinoza/two")
            ]
        );
    }

    #[test]
    fn optional_sections_override_defaults() {
        let text = format!(
            "{}\n[mri]\nsync = \"5\"\n\n[keyboard]\nquit = \"escape\"\n\n[window]\nsize = [800, 600]\nfullscreen = false\ncolor = \"#000000\"\n",
            SETTINGS
        );
        let cfg = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap();
        assert_eq!(cfg.trigger_key, Key::Char('5'));
        assert_eq!(cfg.quit_key, Key::Escape);
        assert_eq!(cfg.window.size, [800, 600]);
        assert!(!cfg.window.fullscreen);
        assert_eq!(cfg.window.color, Rgba::BLACK);
    }

    #[test]
    fn missing_duration_is_fatal() {
        let text = SETTINGS.replace("fix_movie_interval = 2\n", "");
        let err = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::KeyNotFound { key, .. } if key == "fix_movie_interval"
        ));
    }

    #[test]
    fn non_numeric_or_negative_duration_is_fatal() {
        let text = SETTINGS.replace("end_duration = 3.0", "end_duration = \"three\"");
        let err = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::WrongType { .. }));

        let text = SETTINGS.replace("end_duration = 3.0", "end_duration = -1.0");
        let err = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn shrink_factor_must_be_a_fraction() {
        let text = SETTINGS.replace("shrink_factor = 0.75", "shrink_factor = 1.5");
        let err = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "shrink_factor"));
    }

    #[test]
    fn bad_color_is_invalid() {
        let text = SETTINGS.replace("fix_color = [-1, -1, -1]", "fix_color = [0, 0]");
        let err = SessionSettings::from_settings(&Settings::from_toml_str(&text).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "fix_color"));
    }
}
