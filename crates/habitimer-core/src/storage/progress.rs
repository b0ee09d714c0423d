//! Per-habit, per-day remaining time.
//!
//! A missing row for a day means the full goal is still available, which is
//! what makes day rollover lazy: a new date simply has no row yet.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{format_date, format_ts, parse_date, parse_ts};
use crate::error::Result;
use crate::habit::HabitId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub habit_id: HabitId,
    pub date: NaiveDate,
    pub remaining_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

pub fn get_progress(
    conn: &Connection,
    habit_id: HabitId,
    date: NaiveDate,
) -> Result<Option<DailyProgress>> {
    let row = conn
        .query_row(
            "SELECT habit_id, date, remaining_seconds, updated_at
             FROM daily_progress WHERE habit_id = ?1 AND date = ?2",
            params![habit_id, format_date(date)],
            |row| {
                let date: String = row.get(1)?;
                let updated_at: String = row.get(3)?;
                Ok(DailyProgress {
                    habit_id: row.get(0)?,
                    date: parse_date(1, &date)?,
                    remaining_seconds: row.get(2)?,
                    updated_at: parse_ts(3, &updated_at)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Insert or overwrite the row for `(habit_id, date)`. Last writer wins.
/// Negative input is clamped to zero.
pub fn upsert_progress(
    conn: &Connection,
    habit_id: HabitId,
    date: NaiveDate,
    remaining_seconds: i64,
    now: DateTime<Utc>,
) -> Result<DailyProgress> {
    let remaining_seconds = remaining_seconds.max(0);
    conn.execute(
        "INSERT INTO daily_progress (habit_id, date, remaining_seconds, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (habit_id, date)
         DO UPDATE SET remaining_seconds = excluded.remaining_seconds,
                       updated_at = excluded.updated_at",
        params![habit_id, format_date(date), remaining_seconds, format_ts(now)],
    )?;
    Ok(DailyProgress {
        habit_id,
        date,
        remaining_seconds,
        updated_at: now,
    })
}
