use crate::session::SessionContext;
use hcpmovie_core::{DrawPolicy, EventPolicy, Key, Trial, TrialError};
use serde_json::Value;
use std::collections::BTreeMap;

pub const INSTRUCTION_TEXT: &str = "ready to start";
pub const WAIT_TEXT: &str = "Waiting for experiment to start";

pub const MOVIE_PHASES: [&str; 3] = ["fix_pre", "movie", "fix_post"];

/// The four trials of a run, in the order they are presented
pub fn build_trials(ctx: &SessionContext) -> Result<Vec<Trial>, TrialError> {
    let design = &ctx.config.design;

    let instruction = Trial::from_secs(0, &[f64::INFINITY], None)?
        .with_text(ctx.text_stim(INSTRUCTION_TEXT))
        .with_policies(DrawPolicy::Instruction, EventPolicy::Keys(vec![Key::Space]));

    let wait = Trial::from_secs(1, &[f64::INFINITY, design.start_duration], None)?
        .with_text(ctx.text_stim(WAIT_TEXT))
        .with_policies(
            DrawPolicy::WaitForTrigger,
            EventPolicy::TriggerInFirstPhase(ctx.config.trigger_key.clone()),
        );

    let mut parameters = BTreeMap::new();
    parameters.insert("movie".to_string(), Value::from(ctx.options.run));
    parameters.insert("movie_duration".to_string(), Value::from(ctx.movie.duration));
    parameters.insert(
        "movie_file".to_string(),
        Value::from(ctx.movie.path.display().to_string()),
    );
    let movie = Trial::from_secs(
        2,
        &[
            design.fix_movie_interval,
            ctx.movie.duration,
            design.fix_movie_interval,
        ],
        Some(MOVIE_PHASES.iter().map(|s| s.to_string()).collect()),
    )?
    .with_parameters(parameters)
    .with_policies(DrawPolicy::MovieOnly, EventPolicy::Ignore);

    let outro = Trial::from_secs(3, &[design.end_duration], None)?
        .with_text(ctx.text_stim(""))
        .with_policies(DrawPolicy::Instruction, EventPolicy::Keys(vec![Key::Space]));

    Ok(vec![instruction, wait, movie, outro])
}
