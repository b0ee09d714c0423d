mod engine;
mod status;

pub use engine::TimerEngine;
pub use status::{HabitState, HabitView, StopOutcome, TimerPhase, TimerStatus};
