//! Database schema migrations for habitimer.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    }) {
        Ok(v) => Ok(v.unwrap_or(0)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: habits, sessions and the single-row active timer.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            icon            TEXT NOT NULL DEFAULT '⭐',
            color           TEXT NOT NULL DEFAULT '#6366f1',
            target_minutes  INTEGER NOT NULL DEFAULT 30 CHECK (target_minutes >= 0),
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timer_sessions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            habit_id         INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
            started_at       TEXT NOT NULL,
            ended_at         TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL DEFAULT 0 CHECK (duration_seconds >= 0)
        );

        -- At most one row: the primary key is pinned to 1.
        CREATE TABLE IF NOT EXISTS active_timer (
            id                INTEGER PRIMARY KEY CHECK (id = 1),
            habit_id          INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
            started_at        TEXT NOT NULL,
            remaining_seconds INTEGER NOT NULL CHECK (remaining_seconds >= 0),
            original_duration INTEGER NOT NULL,
            revision          INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_habit ON timer_sessions(habit_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON timer_sessions(ended_at);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: per-day progress counters.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS daily_progress (
            habit_id          INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
            date              TEXT NOT NULL,
            remaining_seconds INTEGER NOT NULL CHECK (remaining_seconds >= 0),
            updated_at        TEXT NOT NULL,
            PRIMARY KEY (habit_id, date)
        );",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}
