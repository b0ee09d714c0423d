use clap::Subcommand;
use habitimer_core::{Clock, Config, NewHabit};

use super::{open_engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// List habits with today's state
    List,
    /// Add a habit
    Add {
        /// Habit name
        name: String,
        /// Daily target in minutes (defaults to habits.default_target_minutes)
        #[arg(long)]
        target: Option<i64>,
        /// Icon (an emoji)
        #[arg(long)]
        icon: Option<String>,
        /// Color as a hex string, e.g. "#10b981"
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a habit with its progress and sessions
    Delete {
        /// Habit ID
        id: i64,
    },
    /// Insert the starter habits if the catalog is empty
    Seed,
}

pub fn run(action: HabitAction) -> CmdResult {
    let config = Config::load()?;
    let engine = open_engine(&config)?;

    match action {
        HabitAction::List => {
            print_json(&engine.overview()?)?;
        }
        HabitAction::Add {
            name,
            target,
            icon,
            color,
        } => {
            let input = NewHabit {
                name,
                icon,
                color,
                target_minutes: target,
            };
            let now = engine.clock().now();
            let habit = engine.database()?.create_habit(
                &input,
                config.habits.default_target_minutes,
                now,
            )?;
            print_json(&habit)?;
        }
        HabitAction::Delete { id } => {
            engine.database()?.delete_habit(id)?;
            println!("{{\"deleted\": {id}}}");
        }
        HabitAction::Seed => {
            let now = engine.clock().now();
            let created = engine.database()?.seed_defaults(now)?;
            print_json(&created)?;
        }
    }
    Ok(())
}
