mod app;
mod cli;
mod keys;
mod video;

use anyhow::Context;
use app::App;
use clap::Parser;
use cli::Args;
use hcpmovie_experiment::settings::DEFAULT_TRACKER_ADDRESS;
use hcpmovie_experiment::{FfprobeProbe, Session, Settings, eyetracker};
use hcpmovie_render::load_font;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting hcpmovie v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(&args.settings)?;
    let options = args.session_options();
    let address = settings
        .opt_str("eyetracker", "address")?
        .unwrap_or(DEFAULT_TRACKER_ADDRESS)
        .to_string();
    let tracker = eyetracker::connect(options.eyetracker_on, &address);

    let session = Session::new(settings, options, &FfprobeProbe::new(), tracker)
        .context("Failed to prepare the session")?;
    log::info!(
        "Results will be written to {}",
        session.context().events_path().display()
    );

    let font_path = &session.context().config.text.font_path;
    let font = match load_font(font_path) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("{:#}", e);
            None
        }
    };

    App::new(session, font).run()
}
