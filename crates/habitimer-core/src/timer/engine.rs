//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine over three stores: the
//! active timer register, daily progress and the session log. It keeps no
//! timer state in memory. Every transition is one `BEGIN IMMEDIATE`
//! transaction that reads the register, converts the wall-clock span since
//! `started_at` into whole elapsed seconds and writes all three stores, so
//! concurrent callers (several devices, several processes) always observe
//! zero or one running slot.
//!
//! ## State Transitions
//!
//! ```text
//! Idle(r) --start--> Running(r, t0) --stop/switch--> Idle(max(0, r - elapsed))
//!                        |
//!                        +--reset--> Idle(target)
//! ```
//!
//! Day rollover is lazy: "today" is evaluated at call time and a fresh day has
//! no progress row, so the habit's full target applies.
//!
//! ## Usage
//!
//! ```no_run
//! use habitimer_core::{Database, TimerEngine};
//!
//! let engine = TimerEngine::new(Database::open()?);
//! engine.start(1)?;
//! let status = engine.status()?;
//! engine.stop(None)?;
//! # Ok::<(), habitimer_core::CoreError>(())
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Transaction, TransactionBehavior};

use super::status::{HabitState, HabitView, StopOutcome, TimerPhase, TimerStatus};
use crate::clock::{elapsed_seconds, Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::habit::{Habit, HabitCatalog, HabitId};
use crate::storage::{active, progress, sessions, ActiveTimerSlot, DailyProgress, Database};

/// Core timer engine.
pub struct TimerEngine<C: Clock = SystemClock> {
    db: Mutex<Database>,
    clock: C,
}

impl TimerEngine<SystemClock> {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, SystemClock)
    }

    /// Open the default database.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Database::open()?))
    }
}

impl<C: Clock> TimerEngine<C> {
    pub fn with_clock(db: Database, clock: C) -> Self {
        Self {
            db: Mutex::new(db),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Direct access for catalog maintenance and session queries.
    /// Engine-owned tables must only be mutated through the engine's operations.
    pub fn database(&self) -> Result<MutexGuard<'_, Database>> {
        Ok(self.db.lock()?)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (or switch to) `habit_id`.
    ///
    /// Any running slot is flushed first: its elapsed time is logged as a
    /// session and subtracted from its habit's progress. The new slot begins
    /// from today's remaining time for `habit_id`. Starting the habit that is
    /// already running flushes it and re-anchors `started_at`, so no time is
    /// lost or double counted.
    ///
    /// # Errors
    /// `NotFound` if the habit does not exist; nothing is written.
    pub fn start(&self, habit_id: HabitId) -> Result<ActiveTimerSlot> {
        let slot = self.transact(|tx, now, today| {
            let habit = require_habit(tx, habit_id)?;

            let previous = active::read_slot(tx)?;
            if let Some(prev) = &previous {
                let flushed = flush_slot(tx, prev, now, today)?;
                tracing::info!(
                    from = prev.habit_id,
                    to = habit_id,
                    elapsed = flushed.0.duration_seconds,
                    remaining = flushed.1.remaining_seconds,
                    "flushed running timer before start"
                );
            }

            let remaining = remaining_in(tx, &habit, today)?;
            let original_duration = match &previous {
                Some(prev) if prev.habit_id == habit_id => prev.original_duration,
                _ => remaining,
            };
            active::write_slot(tx, habit_id, now, remaining, original_duration)
        })?;

        tracing::info!(
            habit_id,
            remaining = slot.remaining_seconds,
            started_at = %slot.started_at,
            "timer started"
        );
        Ok(slot)
    }

    /// Stop the running slot, if any.
    ///
    /// With `Some(habit_id)`, only a slot belonging to that habit is stopped.
    /// Nothing running is a successful no-op, and so is losing a race with
    /// another writer: the desired end state already holds.
    pub fn stop(&self, habit_id: Option<HabitId>) -> Result<StopOutcome> {
        let result = self.transact(|tx, now, today| {
            let Some(slot) = active::read_slot(tx)? else {
                return Ok(StopOutcome::nothing_running());
            };
            if habit_id.is_some_and(|id| id != slot.habit_id) {
                return Ok(StopOutcome::nothing_running());
            }
            let (session, progress) = flush_slot(tx, &slot, now, today)?;
            Ok(StopOutcome {
                stopped: true,
                session: Some(session),
                progress: Some(progress),
            })
        });

        match result {
            Ok(outcome) => {
                if let Some(session) = &outcome.session {
                    tracing::info!(
                        habit_id = session.habit_id,
                        duration_seconds = session.duration_seconds,
                        "timer stopped"
                    );
                } else {
                    tracing::debug!("stop requested with nothing running");
                }
                Ok(outcome)
            }
            Err(CoreError::Conflict(reason)) => {
                tracing::warn!(%reason, "stop lost a race; treating as already stopped");
                Ok(StopOutcome::nothing_running())
            }
            Err(e) => Err(e),
        }
    }

    /// Pausing is stopping: progress is persisted and `start` resumes from it.
    pub fn pause(&self) -> Result<StopOutcome> {
        self.stop(None)
    }

    /// Restore today's full target for `habit_id`.
    ///
    /// If the habit is running its slot is discarded without logging a
    /// session.
    pub fn reset(&self, habit_id: HabitId) -> Result<DailyProgress> {
        let (row, abandoned) = self.transact(|tx, now, today| {
            let habit = require_habit(tx, habit_id)?;
            let mut abandoned = false;
            if let Some(slot) = active::read_slot(tx)? {
                if slot.habit_id == habit_id {
                    if !active::delete_slot_if(tx, &slot)? {
                        return Err(CoreError::Conflict(format!(
                            "active timer changed while resetting habit {habit_id}"
                        )));
                    }
                    abandoned = true;
                }
            }
            let row = progress::upsert_progress(tx, habit_id, today, habit.target_seconds(), now)?;
            Ok((row, abandoned))
        })?;

        tracing::info!(habit_id, abandoned_run = abandoned, "habit reset");
        Ok(row)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The running slot with derived values, or `None`.
    ///
    /// Never writes; reaching zero is reported as `TimerPhase::Completed`
    /// and left for the next `stop`/`start` to settle.
    pub fn status(&self) -> Result<Option<TimerStatus>> {
        let now = self.clock.now();
        let db = self.database()?;
        let status = active::read_slot(db.conn())?.map(|slot| TimerStatus::derive(slot, now));
        tracing::debug!(
            habit_id = status.as_ref().map(|s| s.habit_id()),
            "status read"
        );
        Ok(status)
    }

    /// Today's stored remaining seconds for `habit_id`, or its full target.
    pub fn daily_remaining(&self, habit_id: HabitId) -> Result<i64> {
        let today = self.clock.today();
        let db = self.database()?;
        let tx = db.conn().unchecked_transaction()?;
        let habit = require_habit(&tx, habit_id)?;
        remaining_in(&tx, &habit, today)
    }

    /// State of one habit right now, folding in a running slot.
    pub fn habit_state(&self, habit_id: HabitId) -> Result<HabitState> {
        let now = self.clock.now();
        let today = self.clock.date_of(now);
        let db = self.database()?;
        let tx = db.conn().unchecked_transaction()?;
        let habit = require_habit(&tx, habit_id)?;
        let slot = active::read_slot(&tx)?;
        state_of(&tx, &habit, slot.as_ref(), now, today)
    }

    /// Every habit with its state for today, in catalog order.
    pub fn overview(&self) -> Result<Vec<HabitView>> {
        let now = self.clock.now();
        let today = self.clock.date_of(now);
        let db = self.database()?;
        let tx = db.conn().unchecked_transaction()?;
        let slot = active::read_slot(&tx)?;
        let mut views = Vec::new();
        for habit in tx.list_habits()? {
            let state = state_of(&tx, &habit, slot.as_ref(), now, today)?;
            views.push(HabitView { habit, state });
        }
        Ok(views)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Run `f` inside one immediate transaction. Any error rolls everything back.
    fn transact<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>, DateTime<Utc>, NaiveDate) -> Result<T>,
    ) -> Result<T> {
        let mut db = self.database()?;
        let tx = db
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Read the clock after taking the write lock so elapsed time is
        // measured at the moment the transition becomes visible.
        let now = self.clock.now();
        let today = self.clock.date_of(now);
        let out = f(&tx, now, today)?;
        tx.commit()?;
        Ok(out)
    }
}

fn require_habit(catalog: &impl HabitCatalog, habit_id: HabitId) -> Result<Habit> {
    catalog.get_habit(habit_id)?.ok_or(CoreError::NotFound { habit_id })
}

fn remaining_in(conn: &rusqlite::Connection, habit: &Habit, today: NaiveDate) -> Result<i64> {
    Ok(progress::get_progress(conn, habit.id, today)?
        .map(|row| row.remaining_seconds)
        .unwrap_or_else(|| habit.target_seconds()))
}

/// Log the slot's elapsed time, write its habit's progress for today and
/// remove it from the register.
fn flush_slot(
    tx: &Transaction<'_>,
    slot: &ActiveTimerSlot,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<(sessions::TimerSession, DailyProgress)> {
    let elapsed = elapsed_seconds(slot.started_at, now);
    let new_remaining = (slot.remaining_seconds - elapsed).max(0);

    let session = sessions::append_session(tx, slot.habit_id, slot.started_at, now, elapsed)?;
    let row = progress::upsert_progress(tx, slot.habit_id, today, new_remaining, now)?;
    if !active::delete_slot_if(tx, slot)? {
        return Err(CoreError::Conflict(format!(
            "active timer for habit {} was replaced before it could be stopped",
            slot.habit_id
        )));
    }
    Ok((session, row))
}

fn state_of(
    conn: &rusqlite::Connection,
    habit: &Habit,
    slot: Option<&ActiveTimerSlot>,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<HabitState> {
    if let Some(slot) = slot.filter(|s| s.habit_id == habit.id) {
        let status = TimerStatus::derive(slot.clone(), now);
        return Ok(match status.phase {
            TimerPhase::Completed => HabitState::Completed,
            TimerPhase::Running => HabitState::Running {
                remaining_at_start: slot.remaining_seconds,
                started_at: slot.started_at,
                current_remaining: status.current_remaining,
            },
        });
    }
    Ok(HabitState::Idle {
        remaining_seconds: remaining_in(conn, habit, today)?,
    })
}
