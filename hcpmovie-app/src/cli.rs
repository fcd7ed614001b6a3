use clap::Parser;
use hcpmovie_experiment::SessionOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hcpmovie")]
#[command(about = "HCP movie watching run with optional eye tracking", long_about = None)]
#[command(version)]
pub struct Args {
    /// Subject identifier, used in output file names
    #[arg(short, long, default_value = "1")]
    pub subject: String,

    /// Run number; run N plays the Nth movie in the settings
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub run: u32,

    /// Use the eye tracker
    #[arg(long)]
    pub eyelink: bool,

    /// Experiment settings file
    #[arg(long, default_value = "settings.toml")]
    pub settings: PathBuf,

    /// Where event logs and the settings copy are written
    #[arg(short, long, default_value = "logs")]
    pub output_dir: PathBuf,
}

impl Args {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            subject: self.subject.clone(),
            run: self.run,
            eyetracker_on: self.eyelink,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["hcpmovie"]).unwrap();
        assert_eq!(args.subject, "1");
        assert_eq!(args.run, 1);
        assert!(!args.eyelink);
        assert_eq!(args.settings, PathBuf::from("settings.toml"));

        let options = args.session_options();
        assert_eq!(options.output_dir, PathBuf::from("logs"));
        assert_eq!(options.output_str(), "sub-1_run-1_task-movie");
    }

    #[test]
    fn explicit_values() {
        let args = Args::try_parse_from([
            "hcpmovie",
            "--subject",
            "07",
            "--run",
            "3",
            "--eyelink",
            "--settings",
            "lab.toml",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();
        let options = args.session_options();
        assert_eq!(options.subject, "07");
        assert_eq!(options.run, 3);
        assert!(options.eyetracker_on);
        assert_eq!(args.settings, PathBuf::from("lab.toml"));
        assert_eq!(options.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn run_zero_is_rejected() {
        assert!(Args::try_parse_from(["hcpmovie", "--run", "0"]).is_err());
        assert!(Args::try_parse_from(["hcpmovie", "--run", "two"]).is_err());
    }
}
