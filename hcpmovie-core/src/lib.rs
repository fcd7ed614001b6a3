pub mod event;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use event::{InputEvent, Key};
pub use phase::{PhaseClock, PhaseDuration};
pub use stimulus::{Drawable, FixationLines, MovieStim, Position, Rgba, TextStim};
pub use trial::{DrawPolicy, EventPolicy, Layer, Transition, Trial, TrialError};
