//! UI panels: playback controls and runtime statistics

mod stats;
mod time_controls;

pub use stats::*;
pub use time_controls::*;
