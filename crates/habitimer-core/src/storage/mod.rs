mod config;
pub mod active;
pub mod database;
pub mod habits;
pub mod migrations;
pub mod progress;
pub mod sessions;

pub use active::ActiveTimerSlot;
pub use config::{Config, HabitsConfig, MirrorConfig, ServerConfig};
pub use database::Database;
pub use progress::DailyProgress;
pub use sessions::TimerSession;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ConfigError, Result};

/// Returns the data directory, creating it if needed.
///
/// `HABITIMER_DATA_DIR` wins when set. Otherwise `~/.config/habitimer[-dev]/`,
/// with `HABITIMER_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("HABITIMER_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("HABITIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("habitimer-dev")
            } else {
                base_dir.join("habitimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
