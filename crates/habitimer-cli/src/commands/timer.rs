use clap::Subcommand;
use habitimer_core::{Clock, Config, TimerStatus};

use super::{open_engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a habit's timer, stopping whatever else is running
    Start {
        /// Habit ID
        habit_id: i64,
    },
    /// Stop the running timer
    Stop {
        /// Only stop if this habit is the one running
        #[arg(long)]
        habit_id: Option<i64>,
    },
    /// Pause the running timer (progress is kept)
    Pause,
    /// Resume a habit from today's remaining time
    Resume {
        /// Habit ID
        habit_id: i64,
    },
    /// Restore a habit's full daily target
    Reset {
        /// Habit ID
        habit_id: i64,
    },
    /// Print the running timer as JSON, or null
    Status,
    /// Print today's remaining seconds for a habit
    Remaining {
        /// Habit ID
        habit_id: i64,
    },
}

pub fn run(action: TimerAction) -> CmdResult {
    let config = Config::load()?;
    let engine = open_engine(&config)?;

    match action {
        TimerAction::Start { habit_id } | TimerAction::Resume { habit_id } => {
            let slot = engine.start(habit_id)?;
            print_json(&TimerStatus::derive(slot, engine.clock().now()))?;
        }
        TimerAction::Stop { habit_id } => {
            print_json(&engine.stop(habit_id)?)?;
        }
        TimerAction::Pause => {
            print_json(&engine.pause()?)?;
        }
        TimerAction::Reset { habit_id } => {
            print_json(&engine.reset(habit_id)?)?;
        }
        TimerAction::Status => {
            print_json(&engine.status()?)?;
        }
        TimerAction::Remaining { habit_id } => {
            let remaining = engine.daily_remaining(habit_id)?;
            print_json(&serde_json::json!({
                "habit_id": habit_id,
                "remaining_seconds": remaining,
            }))?;
        }
    }
    Ok(())
}
