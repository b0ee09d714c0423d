//! Habit catalog queries.
//!
//! Free functions over a `Connection` so they can run on a plain connection
//! or inside an engine transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::{format_ts, parse_ts};
use crate::error::Result;
use crate::habit::{Habit, HabitCatalog, HabitId, NewHabit};

const HABIT_COLUMNS: &str = "id, name, icon, color, target_minutes, created_at, updated_at";

fn row_to_habit(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Habit {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        target_minutes: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
    })
}

pub fn get_habit(conn: &Connection, id: HabitId) -> Result<Option<Habit>> {
    let habit = conn
        .query_row(
            &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
            params![id],
            row_to_habit,
        )
        .optional()?;
    Ok(habit)
}

pub fn list_habits(conn: &Connection) -> Result<Vec<Habit>> {
    let mut stmt = conn.prepare(&format!("SELECT {HABIT_COLUMNS} FROM habits ORDER BY id ASC"))?;
    let habits = stmt
        .query_map([], row_to_habit)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(habits)
}

pub fn insert_habit(
    conn: &Connection,
    input: &NewHabit,
    default_target: u32,
    now: DateTime<Utc>,
) -> Result<Habit> {
    let (name, icon, color, target_minutes) = input.normalize(default_target)?;
    let ts = format_ts(now);
    conn.execute(
        "INSERT INTO habits (name, icon, color, target_minutes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![name, icon, color, target_minutes, ts],
    )?;
    Ok(Habit {
        id: conn.last_insert_rowid(),
        name,
        icon,
        color,
        target_minutes,
        created_at: now,
        updated_at: now,
    })
}

/// Delete a habit. Progress rows, sessions and the active slot go with it
/// through `ON DELETE CASCADE`. Returns whether a row was removed.
pub fn delete_habit(conn: &Connection, id: HabitId) -> Result<bool> {
    let removed = conn.execute("DELETE FROM habits WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

pub fn count_habits(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM habits", [], |row| row.get(0))?)
}

impl HabitCatalog for Connection {
    fn get_habit(&self, id: HabitId) -> Result<Option<Habit>> {
        get_habit(self, id)
    }

    fn list_habits(&self) -> Result<Vec<Habit>> {
        list_habits(self)
    }
}

/// Lets the engine read the catalog from inside its own transaction.
impl HabitCatalog for Transaction<'_> {
    fn get_habit(&self, id: HabitId) -> Result<Option<Habit>> {
        get_habit(self, id)
    }

    fn list_habits(&self) -> Result<Vec<Habit>> {
        list_habits(self)
    }
}
