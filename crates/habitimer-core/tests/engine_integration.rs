//! Integration tests for the timer engine.
//!
//! These drive the public API end to end against an in-memory database and a
//! manual clock: switching habits, day rollover, reset, cascade delete and
//! the mirror following the engine.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use habitimer_core::{
    Clock, CoreError, Database, HabitCatalog, HabitId, HabitState, ManualClock, MirrorDriver, MirrorEvent,
    MirrorSettings, NewHabit, TimerEngine, TimerPhase,
};

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    engine: Arc<TimerEngine<Arc<ManualClock>>>,
    clock: Arc<ManualClock>,
    h1: HabitId,
    h2: HabitId,
}

/// h1 = 30 minutes, h2 = 10 minutes, clock at 2026-05-20 10:00 UTC.
fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 20, 10, 0, 0).unwrap(),
    ));
    let db = Database::open_memory().unwrap();
    let now = clock.now();
    let h1 = db.create_habit(&NewHabit::new("Read Book", 30), 30, now).unwrap().id;
    let h2 = db.create_habit(&NewHabit::new("Meditation", 10), 30, now).unwrap().id;
    Harness {
        engine: Arc::new(TimerEngine::with_clock(db, Arc::clone(&clock))),
        clock,
        h1,
        h2,
    }
}

fn sessions_for(h: &Harness, habit_id: HabitId) -> Vec<i64> {
    h.engine
        .database()
        .unwrap()
        .list_sessions(Some(habit_id), 100)
        .unwrap()
        .into_iter()
        .map(|s| s.duration_seconds)
        .collect()
}

// ============================================================================
// Switching
// ============================================================================

#[test]
fn test_switch_logs_previous_habit_and_keeps_its_progress() {
    let h = harness();
    h.engine.start(h.h1).unwrap();

    h.clock.advance_secs(10);
    let status = h.engine.status().unwrap().unwrap();
    assert_eq!(status.current_remaining, 1790);

    h.clock.advance_secs(20);
    let slot = h.engine.start(h.h2).unwrap();
    assert_eq!(slot.habit_id, h.h2);
    assert_eq!(slot.remaining_seconds, 600);

    assert_eq!(sessions_for(&h, h.h1), vec![30]);
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1770);

    let status = h.engine.status().unwrap().unwrap();
    assert_eq!(status.habit_id(), h.h2);
}

#[test]
fn test_switch_back_resumes_where_it_left_off() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(300);
    h.engine.start(h.h2).unwrap();
    h.clock.advance_secs(60);
    let slot = h.engine.start(h.h1).unwrap();

    assert_eq!(slot.remaining_seconds, 1500);
    assert_eq!(h.engine.daily_remaining(h.h2).unwrap(), 540);
}

// ============================================================================
// Stop
// ============================================================================

#[test]
fn test_stop_twice_is_idempotent() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(45);

    let first = h.engine.stop(None).unwrap();
    assert!(first.stopped);
    assert_eq!(first.session.as_ref().map(|s| s.duration_seconds), Some(45));
    assert_eq!(first.progress.as_ref().map(|p| p.remaining_seconds), Some(1755));

    let second = h.engine.stop(None).unwrap();
    assert!(!second.stopped);
    assert_eq!(sessions_for(&h, h.h1).len(), 1);
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1755);
}

#[test]
fn test_overrun_clamps_remaining_but_logs_full_elapsed() {
    let h = harness();
    h.engine.start(h.h2).unwrap();
    h.clock.advance_secs(700);

    let status = h.engine.status().unwrap().unwrap();
    assert_eq!(status.phase, TimerPhase::Completed);
    assert_eq!(status.current_remaining, 0);

    h.engine.stop(Some(h.h2)).unwrap();
    assert_eq!(sessions_for(&h, h.h2), vec![700]);
    assert_eq!(h.engine.daily_remaining(h.h2).unwrap(), 0);
}

#[test]
fn test_completed_habit_starts_at_zero() {
    let h = harness();
    h.engine.start(h.h2).unwrap();
    h.clock.advance_secs(600);
    h.engine.stop(None).unwrap();

    assert_eq!(h.engine.habit_state(h.h2).unwrap(), HabitState::Idle { remaining_seconds: 0 });
    let slot = h.engine.start(h.h2).unwrap();
    assert_eq!(slot.remaining_seconds, 0);
    assert_eq!(h.engine.habit_state(h.h2).unwrap(), HabitState::Completed);
}

// ============================================================================
// Reset and rollover
// ============================================================================

#[test]
fn test_reset_running_habit_discards_run_without_session() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(120);

    let row = h.engine.reset(h.h1).unwrap();
    assert_eq!(row.remaining_seconds, 1800);
    assert!(h.engine.status().unwrap().is_none());
    assert!(sessions_for(&h, h.h1).is_empty());
}

#[test]
fn test_reset_other_habit_leaves_running_slot() {
    let h = harness();
    h.engine.start(h.h2).unwrap();
    h.engine.start(h.h1).unwrap();
    h.engine.reset(h.h2).unwrap();
    assert_eq!(h.engine.status().unwrap().unwrap().habit_id(), h.h1);
}

#[test]
fn test_new_day_starts_from_full_target() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(600);
    h.engine.stop(None).unwrap();
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1200);

    h.clock.advance(Duration::days(1));
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1800);
    let slot = h.engine.start(h.h1).unwrap();
    assert_eq!(slot.remaining_seconds, 1800);
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_unknown_habit_is_not_found() {
    let h = harness();
    assert!(matches!(h.engine.start(404), Err(CoreError::NotFound { habit_id: 404 })));
    assert!(matches!(h.engine.reset(404), Err(CoreError::NotFound { .. })));
    assert!(matches!(h.engine.daily_remaining(404), Err(CoreError::NotFound { .. })));
}

#[test]
fn test_deleting_running_habit_clears_slot_and_history() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(5);
    h.engine.start(h.h2).unwrap();

    {
        let db = h.engine.database().unwrap();
        db.delete_habit(h.h2).unwrap();
        assert!(db.get_habit(h.h2).unwrap().is_none());
    }
    assert!(h.engine.status().unwrap().is_none());
    assert_eq!(sessions_for(&h, h.h1), vec![5]);
}

#[test]
fn test_overview_reports_every_habit() {
    let h = harness();
    h.engine.start(h.h2).unwrap();
    h.clock.advance_secs(15);

    let views = h.engine.overview().unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].state, HabitState::Idle { remaining_seconds: 1800 });
    assert!(matches!(
        views[1].state,
        HabitState::Running { remaining_at_start: 600, current_remaining: 585, .. }
    ));
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn test_failed_switch_rolls_back() {
    let h = harness();
    h.engine.start(h.h1).unwrap();
    h.clock.advance_secs(30);

    h.engine
        .database()
        .unwrap()
        .conn()
        .execute_batch(
            "CREATE TRIGGER fail_progress_write BEFORE INSERT ON daily_progress
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

    let err = h.engine.start(h.h2).unwrap_err();
    assert!(matches!(err, CoreError::Database(_)), "{err}");

    // Neither the session nor the new slot survived; h1 is still running.
    assert!(sessions_for(&h, h.h1).is_empty());
    let status = h.engine.status().unwrap().unwrap();
    assert_eq!(status.habit_id(), h.h1);
    assert_eq!(status.current_remaining, 1770);
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1800);

    h.engine
        .database()
        .unwrap()
        .conn()
        .execute_batch("DROP TRIGGER fail_progress_write;")
        .unwrap();
    let outcome = h.engine.stop(None).unwrap();
    assert_eq!(outcome.session.unwrap().duration_seconds, 30);
    assert_eq!(h.engine.daily_remaining(h.h1).unwrap(), 1770);
}

// ============================================================================
// Mirror
// ============================================================================

#[tokio::test]
async fn test_mirror_tracks_switch_after_reconcile() {
    let h = harness();
    h.engine.start(h.h1).unwrap();

    let mut driver = MirrorDriver::new(
        Arc::clone(&h.engine),
        Arc::clone(&h.clock),
        MirrorSettings::default(),
    );
    driver.reconcile().await.unwrap();
    h.clock.advance_secs(30);
    assert!(matches!(
        driver.tick(),
        MirrorEvent::Tick { remaining_seconds: 1770, .. }
    ));

    // Another device switches to h2; until the next reconcile the mirror
    // still shows h1.
    h.engine.start(h.h2).unwrap();
    assert_eq!(driver.mirror().habit_id(), Some(h.h1));

    let event = driver.reconcile().await.unwrap();
    assert!(matches!(
        event,
        MirrorEvent::Resynced { habit_id: Some(id), remaining_seconds: Some(600), .. } if id == h.h2
    ));
    assert_eq!(driver.cache().remaining_for(h.h1, h.clock.now(), h.clock.today()), Some(1770));
}
