use chrono::{Duration, Local, Utc};
use clap::Subcommand;
use habitimer_core::Config;

use super::{open_engine, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List logged sessions, newest first
    List {
        /// Only sessions of this habit
        #[arg(long)]
        habit_id: Option<i64>,
        /// Maximum number of sessions
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List sessions that ended since local midnight
    Today,
}

pub fn run(action: SessionsAction) -> CmdResult {
    let config = Config::load()?;
    let engine = open_engine(&config)?;
    let db = engine.database()?;

    match action {
        SessionsAction::List { habit_id, limit } => {
            print_json(&db.list_sessions(habit_id, limit)?)?;
        }
        SessionsAction::Today => {
            let now = Utc::now();
            let midnight = Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|t| t.and_local_timezone(Local).earliest())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|| now - Duration::hours(24));
            print_json(&db.sessions_between(midnight, now)?)?;
        }
    }
    Ok(())
}
