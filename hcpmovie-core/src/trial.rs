use crate::event::{InputEvent, Key};
use crate::phase::{PhaseClock, PhaseDuration};
use crate::stimulus::TextStim;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TrialError {
    #[error("trial {index} has no phases")]
    NoPhases { index: usize },

    #[error("trial {index} has {durations} phase durations but {names} phase names")]
    PhaseCountMismatch {
        index: usize,
        durations: usize,
        names: usize,
    },

    #[error("trial {index} phase {phase} has invalid duration {value}")]
    InvalidDuration {
        index: usize,
        phase: usize,
        value: f64,
    },
}

/// What a trial asks the session to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Fixation,
    ReportFixation,
    Text,
    Movie,
}

/// Per-kind draw behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPolicy {
    /// Both fixations and the trial text, in every phase
    Instruction,
    /// Fixation always; text in phase 0, report fixation afterwards
    WaitForTrigger,
    /// The movie, only in the phase named `movie`
    MovieOnly,
}

impl DrawPolicy {
    pub fn layers(&self, phase: usize, phase_name: &str) -> Vec<Layer> {
        match self {
            DrawPolicy::Instruction => vec![Layer::Fixation, Layer::ReportFixation, Layer::Text],
            DrawPolicy::WaitForTrigger if phase == 0 => vec![Layer::Fixation, Layer::Text],
            DrawPolicy::WaitForTrigger => vec![Layer::Fixation, Layer::ReportFixation],
            DrawPolicy::MovieOnly if phase_name == "movie" => vec![Layer::Movie],
            DrawPolicy::MovieOnly => Vec::new(),
        }
    }
}

/// Per-kind decision on whether an input event ends the current phase early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPolicy {
    AnyKey,
    Keys(Vec<Key>),
    /// Only the scanner trigger, and only while waiting in phase 0
    TriggerInFirstPhase(Key),
    Ignore,
}

impl EventPolicy {
    pub fn stops_phase(&self, phase: usize, event: &InputEvent) -> bool {
        match self {
            EventPolicy::AnyKey => true,
            EventPolicy::Keys(keys) => keys.contains(&event.key),
            EventPolicy::TriggerInFirstPhase(trigger) => phase == 0 && event.key == *trigger,
            EventPolicy::Ignore => false,
        }
    }
}

/// Outcome of one tick of the trial state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Hold,
    Advance { to: usize },
    Terminate,
}

/// One experimental unit: an ordered list of phases run one at a time
#[derive(Debug, Clone)]
pub struct Trial {
    index: usize,
    durations: Vec<PhaseDuration>,
    names: Vec<String>,
    parameters: BTreeMap<String, Value>,
    text: Option<TextStim>,
    draw: DrawPolicy,
    events: EventPolicy,
    current_phase: usize,
}

impl Trial {
    /// Phases without explicit names are all called `stim`
    pub fn new(
        index: usize,
        durations: Vec<PhaseDuration>,
        names: Option<Vec<String>>,
    ) -> Result<Self, TrialError> {
        if durations.is_empty() {
            return Err(TrialError::NoPhases { index });
        }
        let names = names.unwrap_or_else(|| vec!["stim".to_string(); durations.len()]);
        if names.len() != durations.len() {
            return Err(TrialError::PhaseCountMismatch {
                index,
                durations: durations.len(),
                names: names.len(),
            });
        }

        Ok(Self {
            index,
            durations,
            names,
            parameters: BTreeMap::new(),
            text: None,
            draw: DrawPolicy::Instruction,
            events: EventPolicy::Ignore,
            current_phase: 0,
        })
    }

    /// Builds a trial from durations in seconds; `f64::INFINITY` waits for
    /// an event
    pub fn from_secs(
        index: usize,
        secs: &[f64],
        names: Option<Vec<String>>,
    ) -> Result<Self, TrialError> {
        let durations = secs
            .iter()
            .enumerate()
            .map(|(phase, &value)| {
                PhaseDuration::seconds(value).ok_or(TrialError::InvalidDuration {
                    index,
                    phase,
                    value,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(index, durations, names)
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_text(mut self, text: TextStim) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_policies(mut self, draw: DrawPolicy, events: EventPolicy) -> Self {
        self.draw = draw;
        self.events = events;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn durations(&self) -> &[PhaseDuration] {
        &self.durations
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn text(&self) -> Option<&TextStim> {
        self.text.as_ref()
    }

    pub fn draw_policy(&self) -> DrawPolicy {
        self.draw
    }

    pub fn event_policy(&self) -> &EventPolicy {
        &self.events
    }

    pub fn phase_count(&self) -> usize {
        self.durations.len()
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn phase_name(&self) -> Option<&str> {
        self.names.get(self.current_phase).map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.current_phase >= self.durations.len()
    }

    /// Finite durations in seconds, in phase order
    pub fn durations_secs(&self) -> Vec<f64> {
        self.durations.iter().filter_map(PhaseDuration::as_secs).collect()
    }

    /// Decides the next transition without touching the trial.
    ///
    /// A qualifying event or an elapsed finite duration moves on by exactly
    /// one phase; moving past the last phase terminates the trial.
    pub fn advance(&self, clock: PhaseClock, events: &[InputEvent]) -> Transition {
        let Some(duration) = self.durations.get(self.current_phase) else {
            return Transition::Terminate;
        };

        let stopped = events
            .iter()
            .any(|e| self.events.stops_phase(self.current_phase, e));

        if stopped || duration.elapsed_by(clock) {
            let next = self.current_phase + 1;
            if next >= self.durations.len() {
                Transition::Terminate
            } else {
                Transition::Advance { to: next }
            }
        } else {
            Transition::Hold
        }
    }

    pub fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Hold => {}
            Transition::Advance { to } => self.current_phase = to,
            Transition::Terminate => self.current_phase = self.durations.len(),
        }
    }

    /// Layers to draw for the current phase (none once finished)
    pub fn layers(&self) -> Vec<Layer> {
        match self.phase_name() {
            Some(name) => self.draw.layers(self.current_phase, name),
            None => Vec::new(),
        }
    }
}
