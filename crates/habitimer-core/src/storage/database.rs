//! SQLite connection handle.
//!
//! Provides persistent storage for:
//! - The habit catalog
//! - Daily progress counters
//! - The active timer register
//! - The session log

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::{data_dir, habits, migrations, sessions, TimerSession};
use crate::error::{CoreError, DatabaseError, Result};
use crate::habit::{default_habits, Habit, HabitCatalog, HabitId, NewHabit};

/// How long a writer waits on another process's lock before giving up
/// with `StoreUnavailable`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database shared by the habit catalog and the timer engine.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Open the database at `<data_dir>/habitimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("habitimer.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| {
            CoreError::StoreUnavailable(
                DatabaseError::OpenFailed {
                    path: path.to_path_buf(),
                    source,
                }
                .to_string(),
            )
        })?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // === Habit catalog ===

    pub fn create_habit(
        &self,
        input: &NewHabit,
        default_target: u32,
        now: DateTime<Utc>,
    ) -> Result<Habit> {
        let habit = habits::insert_habit(&self.conn, input, default_target, now)?;
        tracing::info!(habit_id = habit.id, name = %habit.name, "habit created");
        Ok(habit)
    }

    /// Delete a habit together with its progress, sessions and active slot.
    pub fn delete_habit(&self, id: HabitId) -> Result<()> {
        if !habits::delete_habit(&self.conn, id)? {
            return Err(CoreError::NotFound { habit_id: id });
        }
        tracing::info!(habit_id = id, "habit deleted");
        Ok(())
    }

    /// Insert the starter habits if the catalog is empty. Returns what was inserted.
    pub fn seed_defaults(&self, now: DateTime<Utc>) -> Result<Vec<Habit>> {
        let tx = self.conn.unchecked_transaction()?;
        if habits::count_habits(&tx)? > 0 {
            return Ok(Vec::new());
        }
        let mut created = Vec::new();
        for input in default_habits() {
            created.push(habits::insert_habit(&tx, &input, 0, now)?);
        }
        tx.commit()?;
        tracing::info!(count = created.len(), "seeded default habits");
        Ok(created)
    }

    // === Session log (read side) ===

    pub fn list_sessions(&self, habit_id: Option<HabitId>, limit: usize) -> Result<Vec<TimerSession>> {
        sessions::list_sessions(&self.conn, habit_id, limit)
    }

    pub fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TimerSession>> {
        sessions::sessions_between(&self.conn, from, to)
    }
}

impl HabitCatalog for Database {
    fn get_habit(&self, id: HabitId) -> Result<Option<Habit>> {
        habits::get_habit(&self.conn, id)
    }

    fn list_habits(&self) -> Result<Vec<Habit>> {
        habits::list_habits(&self.conn)
    }
}
