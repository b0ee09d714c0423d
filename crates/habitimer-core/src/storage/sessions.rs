//! Append-only log of timed intervals.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{format_ts, parse_ts};
use crate::error::Result;
use crate::habit::HabitId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSession {
    pub id: i64,
    pub habit_id: HabitId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<TimerSession> {
    let started_at: String = row.get(2)?;
    let ended_at: String = row.get(3)?;
    Ok(TimerSession {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        started_at: parse_ts(2, &started_at)?,
        ended_at: parse_ts(3, &ended_at)?,
        duration_seconds: row.get(4)?,
    })
}

pub fn append_session(
    conn: &Connection,
    habit_id: HabitId,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    duration_seconds: i64,
) -> Result<TimerSession> {
    let duration_seconds = duration_seconds.max(0);
    conn.execute(
        "INSERT INTO timer_sessions (habit_id, started_at, ended_at, duration_seconds)
         VALUES (?1, ?2, ?3, ?4)",
        params![habit_id, format_ts(started_at), format_ts(ended_at), duration_seconds],
    )?;
    Ok(TimerSession {
        id: conn.last_insert_rowid(),
        habit_id,
        started_at,
        ended_at,
        duration_seconds,
    })
}

/// Most recent sessions first, optionally for one habit.
pub fn list_sessions(
    conn: &Connection,
    habit_id: Option<HabitId>,
    limit: usize,
) -> Result<Vec<TimerSession>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT id, habit_id, started_at, ended_at, duration_seconds
         FROM timer_sessions
         WHERE ?1 IS NULL OR habit_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let sessions = stmt
        .query_map(params![habit_id, limit], row_to_session)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}

/// Sessions that ended in `[from, to)`, in insertion order.
pub fn sessions_between(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<TimerSession>> {
    // Timestamps are stored as UTC RFC 3339, so text order is time order.
    let mut stmt = conn.prepare(
        "SELECT id, habit_id, started_at, ended_at, duration_seconds
         FROM timer_sessions
         WHERE ended_at >= ?1 AND ended_at < ?2
         ORDER BY id ASC",
    )?;
    let sessions = stmt
        .query_map(params![format_ts(from), format_ts(to)], row_to_session)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}
