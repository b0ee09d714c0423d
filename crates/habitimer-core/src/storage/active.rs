//! The active timer register: zero or one row in `active_timer`.
//!
//! The row id is pinned to 1, so a second concurrent slot cannot exist at the
//! storage level. Every write bumps `revision`, which the engine uses as a
//! compare-and-swap token when it removes the slot.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{format_ts, parse_ts};
use crate::error::Result;
use crate::habit::HabitId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTimerSlot {
    pub habit_id: HabitId,
    /// Wall-clock time of the most recent start/resume.
    pub started_at: DateTime<Utc>,
    /// Remaining seconds as of `started_at`.
    pub remaining_seconds: i64,
    /// Remaining seconds when this habit's current run began (progress ring only).
    pub original_duration: i64,
    pub revision: i64,
}

impl ActiveTimerSlot {
    /// Absolute instant at which the countdown reaches zero.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(self.remaining_seconds)
    }
}

pub fn read_slot(conn: &Connection) -> Result<Option<ActiveTimerSlot>> {
    let slot = conn
        .query_row(
            "SELECT habit_id, started_at, remaining_seconds, original_duration, revision
             FROM active_timer WHERE id = 1",
            [],
            |row| {
                let started_at: String = row.get(1)?;
                Ok(ActiveTimerSlot {
                    habit_id: row.get(0)?,
                    started_at: parse_ts(1, &started_at)?,
                    remaining_seconds: row.get(2)?,
                    original_duration: row.get(3)?,
                    revision: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(slot)
}

/// Replace whatever occupies the register with a new slot in one statement.
pub fn write_slot(
    conn: &Connection,
    habit_id: HabitId,
    started_at: DateTime<Utc>,
    remaining_seconds: i64,
    original_duration: i64,
) -> Result<ActiveTimerSlot> {
    let remaining_seconds = remaining_seconds.max(0);
    let revision = next_revision(conn)?;
    conn.execute(
        "INSERT INTO active_timer (id, habit_id, started_at, remaining_seconds, original_duration, revision)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (id) DO UPDATE SET
             habit_id = excluded.habit_id,
             started_at = excluded.started_at,
             remaining_seconds = excluded.remaining_seconds,
             original_duration = excluded.original_duration,
             revision = excluded.revision",
        params![
            habit_id,
            format_ts(started_at),
            remaining_seconds,
            original_duration,
            revision
        ],
    )?;
    Ok(ActiveTimerSlot {
        habit_id,
        started_at,
        remaining_seconds,
        original_duration,
        revision,
    })
}

/// Monotonic across deletes, so a token read before a stop/start pair can
/// never match the slot written after it.
fn next_revision(conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES ('active_timer_revision', '1')
         ON CONFLICT (key) DO UPDATE SET value = CAST(value AS INTEGER) + 1",
        [],
    )?;
    let revision = conn.query_row(
        "SELECT CAST(value AS INTEGER) FROM kv WHERE key = 'active_timer_revision'",
        [],
        |row| row.get(0),
    )?;
    Ok(revision)
}

/// Remove the slot only if it is still the one that was read.
/// Returns `false` when someone else already replaced or removed it.
pub fn delete_slot_if(conn: &Connection, expected: &ActiveTimerSlot) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM active_timer WHERE id = 1 AND habit_id = ?1 AND revision = ?2",
        params![expected.habit_id, expected.revision],
    )?;
    Ok(removed == 1)
}
